use serde::Serialize;

use super::conversation::DEFAULT_MAX_MESSAGES;
use crate::types::Params;

pub const DEFAULT_MAX_DEPTH: usize = 32;
pub const DEFAULT_MODEL_RETRIES: usize = 2;

/// Answer returned when the model backend keeps failing.
pub const FALLBACK_RESPONSE: &str = "I'm sorry, an unexpected error occurred.";
/// Answer returned when a task runs into the depth ceiling.
pub const DEPTH_EXCEEDED_RESPONSE: &str =
    "I'm sorry, I could not finish this task within the allowed number of steps.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The model replied without an action block.
    Answered,
    /// The model handed its result back through `pass_result`.
    Passed,
    ModelUnavailable,
    DepthExceeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub tool: String,
    pub params: Params,
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub response: String,
    pub status: TaskStatus,
    pub steps: Vec<AgentStep>,
    /// Model turns taken by the task.
    pub depth: usize,
}

impl AgentOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::ModelUnavailable | TaskStatus::DepthExceeded
        )
    }
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: Option<String>,
    /// `None` lets the loop recurse until the model stops on its own.
    pub max_depth: Option<usize>,
    pub model_retries: usize,
    pub max_messages: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            model_retries: DEFAULT_MODEL_RETRIES,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}
