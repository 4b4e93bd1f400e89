use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use super::ui::{UiCommand, UiQueue, UiQueueError, WidgetKind};
use crate::application::agent::{Agent, AgentAction};
use crate::application::tooling::{
    Tool, ToolCapability, ToolError, ToolInvokeError, ToolParameter, ToolSpec, bind_params,
    describe_specs,
};
use crate::types::{Params, value_to_text};

pub const DEFAULT_WORKER_THREADS: usize = 5;
pub const CREATE_TEXT_WIDGET: &str = "create_text_widget";
pub const DEFAULT_WIDGET_TITLE: &str = "INFORMATION";
pub const EMPTY_RESULT: &str = "Error: Empty result from tool";
pub const UNKNOWN_TARGET: &str = "Unknown function called.";

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCall {
    pub name: String,
    pub params: Params,
}

impl DispatchCall {
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl From<AgentAction> for DispatchCall {
    fn from(action: AgentAction) -> Self {
        Self::new(action.name, action.params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub name: String,
    pub output: String,
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("missing required parameter 'prompt'")]
    MissingPrompt,
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Ui(#[from] UiQueueError),
    #[error("worker pool is shut down")]
    PoolClosed,
    #[error("dispatched unit stopped unexpectedly: {0}")]
    Aborted(String),
}

/// What a dispatch name resolves to.
#[derive(Clone)]
pub enum DispatchTarget {
    /// Runs a full task on the agent, with the `prompt` parameter as input.
    Agent(Arc<Mutex<Agent>>),
    Tool(Arc<dyn Tool>),
    /// Queues a text widget on the UI channel without taking a worker.
    TextWidget(UiQueue),
}

#[derive(Clone)]
struct Entry {
    spec: ToolSpec,
    target: DispatchTarget,
}

/// Fans one model turn's actions out concurrently and joins them in call
/// order.
///
/// Agents and blocking tools hold one of `workers` permits while they run;
/// asynchronous tools and UI requests do not.
#[derive(Clone)]
pub struct Dispatcher {
    order: Vec<String>,
    targets: HashMap<String, Entry>,
    workers: Arc<Semaphore>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_THREADS)
    }
}

impl Dispatcher {
    pub fn new(worker_threads: usize) -> Self {
        Self {
            order: Vec::new(),
            targets: HashMap::new(),
            workers: Arc::new(Semaphore::new(worker_threads.max(1))),
        }
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.register_agent(agent);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register_tool(tool);
        self
    }

    pub fn with_text_widget(mut self, ui: UiQueue) -> Self {
        self.register_text_widget(ui);
        self
    }

    /// Registers `agent` under its identity with spaces replaced by `_`.
    pub fn register_agent(&mut self, agent: Agent) -> Arc<Mutex<Agent>> {
        let name = agent_target_name(agent.identity());
        let summary = agent
            .description()
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("Delegates a task to a specialised agent.")
            .to_string();
        let spec = ToolSpec::new(name, summary).with_parameter(ToolParameter::required(
            "prompt",
            "Complete, self-contained task for the agent",
        ));
        let agent = Arc::new(Mutex::new(agent));
        self.insert(spec, DispatchTarget::Agent(agent.clone()));
        agent
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        let spec = tool.spec().clone();
        self.insert(spec, DispatchTarget::Tool(tool));
    }

    pub fn register_text_widget(&mut self, ui: UiQueue) {
        let spec = ToolSpec::new(
            CREATE_TEXT_WIDGET,
            "Shows text to the user in a separate widget.",
        )
        .with_parameter(ToolParameter::optional(
            "title",
            "Widget title",
            DEFAULT_WIDGET_TITLE,
        ))
        .with_parameter(ToolParameter::required("text", "Text to display"));
        self.insert(spec, DispatchTarget::TextWidget(ui));
    }

    fn insert(&mut self, spec: ToolSpec, target: DispatchTarget) {
        let key = spec.name.to_lowercase();
        if self.targets.insert(key.clone(), Entry { spec, target }).is_none() {
            self.order.push(key);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|key| self.targets.get(key))
            .map(|entry| entry.spec.name.clone())
            .collect()
    }

    /// Capability listing for the orchestrator's system prompt.
    pub fn describe(&self) -> String {
        describe_specs(
            self.order
                .iter()
                .filter_map(|key| self.targets.get(key))
                .map(|entry| &entry.spec),
        )
    }

    /// Runs every call concurrently and returns one result per call, in the
    /// order the calls were given. A failing unit never cancels the others.
    pub async fn dispatch_all(&self, calls: Vec<DispatchCall>) -> Vec<DispatchResult> {
        info!(calls = calls.len(), "Dispatching actions");
        let units = calls.into_iter().map(|call| {
            let entry = self.targets.get(&call.name.to_lowercase()).cloned();
            let workers = self.workers.clone();
            async move {
                let Some(entry) = entry else {
                    warn!(unit = %call.name, "Unknown dispatch target");
                    return DispatchResult {
                        name: call.name,
                        output: UNKNOWN_TARGET.to_string(),
                        success: false,
                    };
                };
                let handle = tokio::spawn(run_unit(entry, call.params, workers));
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(DispatchError::Aborted(err.to_string())),
                };
                settle(call.name, outcome)
            }
        });
        join_all(units).await
    }
}

async fn run_unit(
    entry: Entry,
    params: Params,
    workers: Arc<Semaphore>,
) -> Result<String, DispatchError> {
    match entry.target {
        DispatchTarget::Agent(agent) => {
            let prompt = params
                .get("prompt")
                .map(value_to_text)
                .filter(|prompt| !prompt.trim().is_empty())
                .ok_or(DispatchError::MissingPrompt)?;
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::PoolClosed)?;
            let mut agent = agent.lock().await;
            debug!(agent = %agent.identity(), "Running delegated task");
            Ok(agent.run(prompt).await.response)
        }
        DispatchTarget::Tool(tool) => {
            let spec = tool.spec();
            let bound = bind_params(spec, params).map_err(|reason| ToolError::Binding {
                tool: spec.name.clone(),
                reason,
            })?;
            let _permit = match spec.capability {
                ToolCapability::Synchronous => Some(
                    workers
                        .acquire_owned()
                        .await
                        .map_err(|_| DispatchError::PoolClosed)?,
                ),
                ToolCapability::Asynchronous => None,
            };
            let output = tool.invoke(bound).await.map_err(|source: ToolInvokeError| {
                ToolError::Execution {
                    tool: spec.name.clone(),
                    source,
                }
            })?;
            Ok(value_to_text(&output))
        }
        DispatchTarget::TextWidget(ui) => {
            let title = params
                .get("title")
                .map(value_to_text)
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_WIDGET_TITLE.to_string());
            let text = params.get("text").map(value_to_text).unwrap_or_default();
            ui.enqueue(UiCommand::CreateWidget {
                kind: WidgetKind::Text,
                title: title.clone(),
                text,
            })?;
            Ok(format!(
                "Successfully queued the creation of a text widget with title '{title}'."
            ))
        }
    }
}

fn settle(name: String, outcome: Result<String, DispatchError>) -> DispatchResult {
    match outcome {
        Ok(output) if output.trim().is_empty() => {
            warn!(unit = %name, "Dispatched unit returned an empty result");
            DispatchResult {
                name,
                output: EMPTY_RESULT.to_string(),
                success: false,
            }
        }
        Ok(output) => DispatchResult {
            name,
            output,
            success: true,
        },
        Err(err) => {
            warn!(unit = %name, %err, "Dispatched unit failed");
            DispatchResult {
                output: format!("Error executing {name}: {err}"),
                name,
                success: false,
            }
        }
    }
}

pub fn agent_target_name(identity: &str) -> String {
    identity.trim().replace(char::is_whitespace, "_")
}
