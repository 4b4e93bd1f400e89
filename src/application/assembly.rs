use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::{Agent, HumanInput};
use crate::application::dispatch::{Dispatcher, UiQueue};
use crate::application::history::{
    FileHistoryStore, HistoryError, HistorySidecar, HistoryStore, WriteBehindPool,
};
use crate::application::orchestrator::Orchestrator;
use crate::application::tooling::{BUILTIN_TOOLS, ToolRegistry, builtin_tool};
use crate::config::{AgentConfig, AppConfig};
use crate::model::ModelProvider;

/// Shared pieces every agent built from one configuration uses.
#[derive(Clone)]
pub struct AgentFactory {
    config: AppConfig,
    provider: Arc<dyn ModelProvider>,
    human: Arc<dyn HumanInput>,
    store: Arc<dyn HistoryStore>,
    pool: WriteBehindPool,
}

impl AgentFactory {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn ModelProvider>,
        human: Arc<dyn HumanInput>,
    ) -> Self {
        let store = Arc::new(history_store(&config));
        let pool = WriteBehindPool::new(config.persistence_workers);
        Self {
            config,
            provider,
            human,
            store,
            pool,
        }
    }

    /// Replaces the file-backed store, e.g. with an in-memory one.
    pub fn with_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_agent(&self, agent: &AgentConfig) -> Agent {
        let tools = ToolRegistry::with_tools(agent.tools.iter().filter_map(|name| {
            let tool = builtin_tool(name);
            if tool.is_none() {
                warn!(agent = %agent.identity, tool = %name, "Skipping unknown tool");
            }
            tool
        }));
        debug!(agent = %agent.identity, tools = tools.len(), "Building agent");
        let history =
            HistorySidecar::new(agent.identity.clone(), self.store.clone(), self.pool.clone());
        Agent::new(
            agent.identity.clone(),
            agent.description.clone(),
            self.provider.clone(),
        )
        .with_tools(tools)
        .with_human_input(self.human.clone())
        .with_history(history)
        .with_options(self.config.agent_options())
    }

    /// Every configured agent, every catalog tool and the text widget.
    pub fn build_dispatcher(&self, ui: UiQueue) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(self.config.worker_threads);
        for agent in &self.config.agents {
            dispatcher.register_agent(self.build_agent(agent));
        }
        for tool in BUILTIN_TOOLS.iter().filter_map(|name| builtin_tool(name)) {
            dispatcher.register_tool(tool);
        }
        dispatcher.register_text_widget(ui);
        dispatcher
    }

    pub fn build_orchestrator(&self, ui: UiQueue) -> Orchestrator {
        let dispatcher = self.build_dispatcher(ui.clone());
        info!(targets = dispatcher.len(), "Orchestrator ready");
        let mut orchestrator = Orchestrator::new(self.provider.clone(), dispatcher)
            .with_options(self.config.agent_options())
            .with_ui(ui);
        if let Some(prompt) = &self.config.system_prompt {
            orchestrator = orchestrator.with_system_prompt(prompt.clone());
        }
        orchestrator
    }
}

pub fn history_store(config: &AppConfig) -> FileHistoryStore {
    let store = match &config.history_dir {
        Some(dir) => FileHistoryStore::new(dir.clone()),
        None => FileHistoryStore::outputs_only(),
    };
    config
        .agents
        .iter()
        .filter_map(|agent| agent.output_file.as_ref().map(|file| (agent, file)))
        .fold(store, |store, (agent, file)| {
            store.with_output_file(agent.identity.clone(), file.clone())
        })
}

/// Wipes and recreates the configured history directory.
pub fn reset_history(config: &AppConfig) -> Result<(), HistoryError> {
    history_store(config).reset()
}
