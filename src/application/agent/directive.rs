use serde_json::Value;

use super::parser::parse_action;
use crate::types::{Params, value_to_text};

pub const ASK_USER: &str = "ask_user";
pub const PASS_RESULT: &str = "pass_result";

/// Structured step extracted from one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    pub thoughts: String,
    pub name: String,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentDirective {
    Final { response: String },
    AskUser { question: String },
    PassResult { result: String },
    CallTool { tool: String, params: Params },
}

impl AgentDirective {
    pub fn from_response(content: &str) -> Self {
        match parse_action(content) {
            Some(action) => Self::from_action(action),
            None => AgentDirective::Final {
                response: content.to_string(),
            },
        }
    }

    pub fn from_action(action: AgentAction) -> Self {
        match action.name.as_str() {
            ASK_USER => AgentDirective::AskUser {
                question: param_or_all(&action.params, "question"),
            },
            PASS_RESULT => AgentDirective::PassResult {
                result: param_or_all(&action.params, "result"),
            },
            _ => AgentDirective::CallTool {
                tool: action.name,
                params: action.params,
            },
        }
    }
}

fn param_or_all(params: &Params, key: &str) -> String {
    match params.get(key) {
        Some(value) => value_to_text(value),
        None => Value::Object(params.clone()).to_string(),
    }
}
