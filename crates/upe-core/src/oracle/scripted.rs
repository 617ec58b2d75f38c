//! Deterministic oracle for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Oracle, OracleError};

/// One canned reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Output(Value),
    Fail(String),
    /// Panics inside the call, to exercise task-failure handling.
    Panic,
}

/// Replies are chosen by `seed - base_seed`, so the answer for a candidate
/// does not depend on the order in which concurrent calls arrive. Seeds past
/// the end of the script reuse the last reply.
#[derive(Debug)]
pub struct ScriptedOracle {
    base_seed: u64,
    replies: Vec<ScriptedReply>,
    calls: Mutex<Vec<(u64, f64)>>,
}

impl ScriptedOracle {
    pub fn new(base_seed: u64, replies: Vec<ScriptedReply>) -> Self {
        Self {
            base_seed,
            replies,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The same output for every call.
    pub fn constant(output: Value) -> Self {
        Self::new(0, vec![ScriptedReply::Output(output)])
    }

    /// Outputs for candidates `base_seed`, `base_seed + 1`, ...
    pub fn outputs(base_seed: u64, outputs: impl IntoIterator<Item = Value>) -> Self {
        Self::new(base_seed, outputs.into_iter().map(ScriptedReply::Output).collect())
    }

    /// `(seed, temperature)` of every call so far, sorted by seed.
    pub fn calls(&self) -> Vec<(u64, f64)> {
        let mut calls = self.calls.lock().map(|c| c.clone()).unwrap_or_default();
        calls.sort_by_key(|(seed, _)| *seed);
        calls
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate(
        &self,
        _prompt: &str,
        seed: u64,
        temperature: f64,
    ) -> Result<Value, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((seed, temperature));
        }
        let index = seed.saturating_sub(self.base_seed) as usize;
        let reply = self
            .replies
            .get(index)
            .or_else(|| self.replies.last())
            .cloned()
            .ok_or_else(|| OracleError::Transport("script is empty".to_string()))?;
        match reply {
            ScriptedReply::Output(value) => Ok(value),
            ScriptedReply::Fail(message) => Err(OracleError::Transport(message)),
            ScriptedReply::Panic => panic!("scripted oracle panic for seed {seed}"),
        }
    }
}
