//! Offline judges.
//!
//! [`StubJudge`] echoes the prompt with braces swapped for parentheses, so the
//! echo never parses as a verdict even when the prompt quotes one, and a
//! stub-backed loop runs end to end without accepting anything. [`ScriptedJudge`]
//! replays canned replies and records the prompts it saw; tests use it in
//! place of a network backend.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;

use super::{Judge, Prompt};

const ECHO_CHARS: usize = 120;

pub struct StubJudge {
    name: String,
}

impl StubJudge {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Judge for StubJudge {
    fn complete(&self, prompt: &Prompt) -> Result<String> {
        let head: String = prompt
            .user
            .chars()
            .take(ECHO_CHARS)
            .map(|c| match c {
                '{' => '(',
                '}' => ')',
                c => c,
            })
            .collect();
        Ok(format!("[{}] {head}", self.name))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Replies from a queue. Once the queue holds a single reply, that reply repeats.
pub struct ScriptedJudge {
    name: String,
    replies: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<Prompt>>,
    delay: Option<Duration>,
    fail: bool,
}

impl ScriptedJudge {
    pub fn new<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            seen: Mutex::new(Vec::new()),
            delay: None,
            fail: false,
        }
    }

    /// A judge whose every call fails, standing in for an unreachable backend.
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name, Vec::<String>::new())
        }
    }

    /// Sleep before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Judge for ScriptedJudge {
    fn complete(&self, prompt: &Prompt) -> Result<String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.seen
            .lock()
            .map_err(|e| anyhow::anyhow!("prompt log poisoned: {e}"))?
            .push(prompt.clone());
        if self.fail {
            anyhow::bail!("{} is unreachable", self.name);
        }

        let mut replies = self
            .replies
            .lock()
            .map_err(|e| anyhow::anyhow!("reply queue poisoned: {e}"))?;
        match replies.len() {
            0 => anyhow::bail!("{} has no scripted reply", self.name),
            1 => Ok(replies[0].clone()),
            _ => Ok(replies.pop_front().unwrap_or_default()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
