//! Mock client for testing
//!
//! Replays scripted replies and records the prompts it receives.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::traits::{ChunkCallback, TutorClient};
use crate::error::{Error, Result, UpstreamKind};

// ─────────────────────────────────────────────────────────────────
// Mock Client Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock client behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Reply used when the script is empty
    pub fixed_response: Option<String>,

    /// Fail every call with this upstream error kind
    pub fail_with: Option<UpstreamKind>,

    /// Characters per chunk when streaming
    pub chunk_size: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fixed_response: None,
            fail_with: None,
            chunk_size: 7,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Client
// ─────────────────────────────────────────────────────────────────

pub struct MockClient {
    config: MockConfig,
    script: Mutex<VecDeque<String>>,
    calls: RwLock<CallLog>,
}

/// Track calls for verification
#[derive(Debug, Default)]
struct CallLog {
    complete: u32,
    complete_streaming: u32,
    last_system_prompt: Option<String>,
    last_user_turn: Option<String>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            script: Mutex::new(VecDeque::new()),
            calls: RwLock::new(CallLog::default()),
        }
    }

    /// Replies handed out in order, one per call.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        client
            .script
            .lock()
            .extend(responses.into_iter().map(Into::into));
        client
    }

    /// Client whose every call fails with `kind`.
    pub fn failing(kind: UpstreamKind) -> Self {
        Self::with_config(MockConfig {
            fail_with: Some(kind),
            ..Default::default()
        })
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.script.lock().push_back(response.into());
    }

    /// Get the number of times a method was called
    pub fn call_count(&self, method: &str) -> u32 {
        let calls = self.calls.read();
        match method {
            "complete" => calls.complete,
            "complete_streaming" => calls.complete_streaming,
            _ => 0,
        }
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.calls.read().last_system_prompt.clone()
    }

    pub fn last_user_turn(&self) -> Option<String> {
        self.calls.read().last_user_turn.clone()
    }

    /// Reset all call records
    pub fn reset_counts(&self) {
        *self.calls.write() = CallLog::default();
    }

    fn record(&self, system_prompt: &str, user_turn: &str) {
        let mut calls = self.calls.write();
        calls.last_system_prompt = Some(system_prompt.to_string());
        calls.last_user_turn = Some(user_turn.to_string());
    }

    fn next_response(&self) -> Result<String> {
        if let Some(kind) = self.config.fail_with {
            return Err(Error::upstream("mock", kind, None, "simulated failure"));
        }
        if let Some(scripted) = self.script.lock().pop_front() {
            return Ok(scripted);
        }
        Ok(self
            .config
            .fixed_response
            .clone()
            .unwrap_or_else(|| "Let's work through this [blue]step by step[/blue].".to_string()))
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TutorClient for MockClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, system_prompt: &str, user_turn: &str) -> Result<String> {
        self.calls.write().complete += 1;
        self.record(system_prompt, user_turn);
        self.next_response()
    }

    async fn complete_streaming<'a>(
        &'a self,
        system_prompt: &'a str,
        user_turn: &'a str,
        mut on_chunk: ChunkCallback<'a>,
    ) -> Result<String> {
        self.calls.write().complete_streaming += 1;
        self.record(system_prompt, user_turn);
        let response = self.next_response()?;

        let chars: Vec<char> = response.chars().collect();
        for chunk in chars.chunks(self.config.chunk_size.max(1)) {
            let chunk: String = chunk.iter().collect();
            if !on_chunk(&chunk) {
                return Err(Error::TurnAbandoned);
            }
            tokio::task::yield_now().await;
        }
        Ok(response)
    }
}
