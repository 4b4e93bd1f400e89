use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::binding::bind_params;
use super::error::ToolError;
use super::interface::{Tool, ToolCapability, ToolSpec};
use crate::types::{Params, value_to_text};

pub const NO_TOOLS_AVAILABLE: &str = "No Provided Tools";

/// Outcome of one successful tool call.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub tool: String,
    pub input: Params,
    pub output: Value,
}

impl ToolExecution {
    pub fn output_text(&self) -> String {
        value_to_text(&self.output)
    }
}

/// Name → tool lookup for a single agent.
///
/// Keys are lowercased; registering a name twice replaces the earlier tool
/// but keeps its position in the listing.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    order: Vec<String>,
    index: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let key = tool.name().to_lowercase();
        let previous = self.index.insert(key.clone(), tool);
        if previous.is_some() {
            debug!(tool = %key, "Replacing previously registered tool");
        } else {
            self.order.push(key);
        }
        previous
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(&name.to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|key| self.index.get(key))
    }

    /// Capability listing embedded in the agent's system prompt.
    pub fn describe(&self) -> String {
        describe_specs(self.tools().map(|tool| tool.spec()))
    }

    pub async fn execute(
        &self,
        tool_name: &str,
        input: Params,
    ) -> Result<ToolExecution, ToolError> {
        let Some(tool) = self.resolve(tool_name) else {
            warn!(requested_tool = %tool_name, "Unknown tool requested by agent");
            return Err(ToolError::UnknownTool(tool_name.to_string()));
        };

        let spec = tool.spec();
        let bound = bind_params(spec, input).map_err(|reason| ToolError::Binding {
            tool: spec.name.clone(),
            reason,
        })?;

        let kind = match spec.capability {
            ToolCapability::Synchronous => "sync",
            ToolCapability::Asynchronous => "async",
        };
        debug!(tool = %spec.name, kind, params = ?bound, "Executing tool");

        match tool.invoke(bound.clone()).await {
            Ok(output) => {
                info!(tool = %spec.name, "Tool executed");
                Ok(ToolExecution {
                    tool: spec.name.clone(),
                    input: bound,
                    output,
                })
            }
            Err(source) => {
                warn!(tool = %spec.name, %source, "Tool execution failed");
                Err(ToolError::Execution {
                    tool: spec.name.clone(),
                    source,
                })
            }
        }
    }
}

/// Numbered `-TOOLn` listing of `specs`; states explicitly when there are none.
pub fn describe_specs<'a>(specs: impl IntoIterator<Item = &'a ToolSpec>) -> String {
    let listing = specs
        .into_iter()
        .enumerate()
        .map(|(position, spec)| {
            let params = spec
                .parameters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            format!(
                "-TOOL{}:\n  NAME: {}\n  DESCRIPTION: {}\n  PARAMS: {}",
                position + 1,
                spec.name,
                spec.description,
                if params.is_empty() { "none" } else { params.as_str() }
            )
        })
        .collect::<Vec<_>>();
    if listing.is_empty() {
        NO_TOOLS_AVAILABLE.to_string()
    } else {
        listing.join("\n")
    }
}
