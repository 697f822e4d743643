#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use storyloom::client::{CompletionRequest, GenerationClient, GenerationError};

/// A generation client replaying canned replies, keyed by agent label.
///
/// Each agent has a FIFO queue; a call for an agent with no queued reply
/// fails, so a test that scripts only the writing stage will loudly catch
/// any unexpected outline or planning call. Call counts are recorded per
/// agent for assertions about which stages actually ran.
pub struct ScriptedClient {
    replies: Mutex<FxHashMap<String, VecDeque<String>>>,
    calls: Mutex<FxHashMap<String, usize>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(FxHashMap::default()),
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Queue a reply for `agent`, returning `self` for chaining.
    #[must_use]
    pub fn with_reply(self, agent: &str, reply: impl Into<String>) -> Self {
        self.push_reply(agent, reply);
        self
    }

    pub fn push_reply(&self, agent: &str, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .entry(agent.to_string())
            .or_default()
            .push_back(reply.into());
    }

    /// How many completions were requested for `agent`.
    pub fn calls_for(&self, agent: &str) -> usize {
        self.calls.lock().unwrap().get(agent).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.agent.clone())
            .or_insert(0) += 1;
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.agent)
            .and_then(VecDeque::pop_front);
        reply.ok_or_else(|| GenerationError::Api {
            agent: request.agent.clone(),
            status: 418,
            message: "no scripted reply queued for this agent".to_string(),
        })
    }
}
