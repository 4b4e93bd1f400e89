use thiserror::Error;

/// Failure raised by a tool body while it runs.
#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("{0}")]
    Failed(String),
    #[error("tool worker stopped before completing: {0}")]
    Worker(String),
}

impl From<String> for ToolInvokeError {
    fn from(message: String) -> Self {
        ToolInvokeError::Failed(message)
    }
}

impl From<&str> for ToolInvokeError {
    fn from(message: &str) -> Self {
        ToolInvokeError::Failed(message.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found.")]
    UnknownTool(String),
    #[error("Invalid params for tool '{tool}': {reason}")]
    Binding { tool: String, reason: String },
    #[error("{source}")]
    Execution {
        tool: String,
        #[source]
        source: ToolInvokeError,
    },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::UnknownTool(name) => name,
            ToolError::Binding { tool, .. } | ToolError::Execution { tool, .. } => tool,
        }
    }
}
