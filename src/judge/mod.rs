//! Completion backends used as judges, planners and reviewers.
//!
//! A [`Judge`] turns a [`Prompt`] into raw text. Structure is recovered
//! afterwards with [`parse_judgment`]. Implementations are blocking; async
//! callers use [`ask`], which bounds the call with a timeout.

pub mod http;
pub mod prompts;
pub mod stub;
pub mod verdict;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::bounded::call_blocking;
use crate::config::JudgeConfig;
use crate::error::{Error, Result};

pub use verdict::{parse_judgment, Judgment, Label, Verdict};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// A prompt with no system text.
    pub fn user_only(user: impl Into<String>) -> Self {
        Self {
            system: String::new(),
            user: user.into(),
        }
    }
}

pub trait Judge: Send + Sync {
    /// Complete `prompt`. Blocking.
    fn complete(&self, prompt: &Prompt) -> anyhow::Result<String>;

    /// Short name used in logs and error messages.
    fn name(&self) -> &str;
}

/// Run `judge` on the blocking pool, failing with [`Error::Timeout`] after `timeout`.
pub async fn ask(judge: &Arc<dyn Judge>, prompt: Prompt, timeout: Duration) -> Result<String> {
    let what = format!("judge {}", judge.name());
    let judge = Arc::clone(judge);
    let started = std::time::Instant::now();
    let raw = call_blocking(&what, timeout, move || judge.complete(&prompt)).await?;
    tracing::debug!(call = %what, elapsed_ms = started.elapsed().as_millis() as u64, "judge replied");
    Ok(raw)
}

/// [`ask`], then parse the reply.
pub async fn evaluate(judge: &Arc<dyn Judge>, prompt: Prompt, timeout: Duration) -> Result<Judgment> {
    let raw = ask(judge, prompt, timeout).await?;
    let judgment = parse_judgment(&raw);
    if judgment.is_unparseable() {
        tracing::warn!(judge = judge.name(), "judge reply held no JSON object");
    }
    Ok(judgment)
}

/// Persona and neutral judges.
#[derive(Clone)]
pub struct JudgePair {
    pub persona: Arc<dyn Judge>,
    pub neutral: Arc<dyn Judge>,
}

/// Build the persona and neutral judges from config.
pub fn create_judges(config: &JudgeConfig) -> Result<JudgePair> {
    match config.backend.as_str() {
        "stub" => Ok(JudgePair {
            persona: Arc::new(stub::StubJudge::new("persona")),
            neutral: Arc::new(stub::StubJudge::new("neutral")),
        }),
        "http" => Ok(JudgePair {
            persona: Arc::new(http::HttpJudge::new(config, &config.persona_model)?),
            neutral: Arc::new(http::HttpJudge::new(config, &config.neutral_model)?),
        }),
        other => Err(Error::config(format!(
            "unknown judge backend: {other}. Supported: stub, http"
        ))),
    }
}
