use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter mapping handed to tools and dispatch targets.
pub type Params = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
    Tool,
}

/// Body of a conversation entry.
///
/// Snapshots store this untagged, so a plain string stays a plain string on
/// disk and structured entries remain readable objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Action { name: String, params: Params },
    Observation { tool: String, output: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, content)
    }

    pub fn action(name: impl Into<String>, params: Params) -> Self {
        Self {
            role: MessageRole::Model,
            content: MessageContent::Action {
                name: name.into(),
                params,
            },
        }
    }

    pub fn observation(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::Observation {
                tool: tool.into(),
                output: output.into(),
            },
        }
    }

    /// Text form submitted to the model backend.
    pub fn render(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Action { name, params } => {
                let params = serde_json::to_string(params).unwrap_or_default();
                format!("Requested action '{name}' with params {params}")
            }
            MessageContent::Observation { output, .. } => output.clone(),
        }
    }

    pub fn is_observation(&self) -> bool {
        self.role == MessageRole::Tool
    }
}

/// Renders a parameter value the way it is shown back to the model: strings
/// verbatim, everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
