use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use super::error::ToolInvokeError;
use crate::types::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCapability {
    Synchronous,
    Asynchronous,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: Some(default.into()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

impl fmt::Display for ToolParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.description)?;
        if let Some(default) = &self.default {
            write!(f, " (default: {default})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub capability: ToolCapability,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            capability: ToolCapability::Synchronous,
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// A callable capability exposed to the model.
///
/// Callers always go through `invoke`; whether the body blocks or awaits is
/// the implementation's concern.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn invoke(&self, params: Params) -> Result<Value, ToolInvokeError>;

    fn name(&self) -> &str {
        &self.spec().name
    }
}

type BlockingHandler = Arc<dyn Fn(Params) -> Result<Value, ToolInvokeError> + Send + Sync>;
type AsyncHandler =
    Arc<dyn Fn(Params) -> BoxFuture<'static, Result<Value, ToolInvokeError>> + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Blocking(BlockingHandler),
    Async(AsyncHandler),
}

/// Closure-backed tool.
///
/// Blocking bodies run on tokio's blocking pool so they never stall the
/// scheduler thread that awaits them.
#[derive(Clone)]
pub struct FnTool {
    spec: ToolSpec,
    handler: Handler,
}

impl FnTool {
    pub fn blocking<F>(mut spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Params) -> Result<Value, ToolInvokeError> + Send + Sync + 'static,
    {
        spec.capability = ToolCapability::Synchronous;
        Self {
            spec,
            handler: Handler::Blocking(Arc::new(handler)),
        }
    }

    pub fn asynchronous<F, Fut>(mut spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolInvokeError>> + Send + 'static,
    {
        spec.capability = ToolCapability::Asynchronous;
        Self {
            spec,
            handler: Handler::Async(Arc::new(move |params| Box::pin(handler(params)))),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").field("spec", &self.spec).finish()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, params: Params) -> Result<Value, ToolInvokeError> {
        match &self.handler {
            Handler::Blocking(handler) => {
                let handler = handler.clone();
                tokio::task::spawn_blocking(move || handler(params))
                    .await
                    .map_err(|err| ToolInvokeError::Worker(err.to_string()))?
            }
            Handler::Async(handler) => handler(params).await,
        }
    }
}
