//! OpenAI-compatible chat-completions judge.
//!
//! Works against any server exposing `POST /v1/chat/completions` (hosted APIs,
//! local GPT4All or llama.cpp servers). The request is sent with the async
//! `reqwest` client, driven to completion on the current tokio runtime from
//! the blocking pool.

use anyhow::{Context, Result};
use serde_json::json;

use super::{Judge, Prompt};
use crate::bounded::block_on_runtime;
use crate::config::JudgeConfig;
use crate::error::Error;

pub struct HttpJudge {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl HttpJudge {
    pub fn new(config: &JudgeConfig, model: &str) -> crate::Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::config("judges.endpoint must not be empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        tracing::info!(endpoint = %config.endpoint, model, auth = api_key.is_some(), "HTTP judge configured");
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: model.to_string(),
            api_key,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(json!({"role": "system", "content": prompt.system}));
        }
        messages.push(json!({"role": "user", "content": prompt.user}));
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "top_p": self.top_p,
            "max_tokens": self.max_tokens,
        })
    }

    async fn send(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?;
        let status = response.status();
        let bytes = response.bytes().await.context("error reading response")?;
        anyhow::ensure!(
            status.is_success(),
            "completion endpoint returned HTTP {status}: {}",
            String::from_utf8_lossy(&bytes).chars().take(200).collect::<String>()
        );
        Ok(bytes.to_vec())
    }
}

/// `choices[0].message.content` from a chat-completions response.
fn completion_text(body: &[u8]) -> Result<String> {
    let parsed: serde_json::Value =
        serde_json::from_slice(body).context("completion endpoint returned invalid JSON")?;
    parsed["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .context("completion response missing choices[0].message.content")
}

impl Judge for HttpJudge {
    fn complete(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::to_vec(&self.request_body(prompt))?;
        let bytes = block_on_runtime(self.send(body))??;
        completion_text(&bytes)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
