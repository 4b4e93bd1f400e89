use std::sync::Arc;

use tracing::{debug, info, warn};

use super::conversation::Conversation;
use super::directive::{ASK_USER, AgentDirective};
use super::human::{HumanInput, NoHumanInput};
use super::instructions::compose_system_prompt;
use super::models::{
    AgentOptions, AgentOutcome, AgentStep, DEPTH_EXCEEDED_RESPONSE, FALLBACK_RESPONSE, TaskStatus,
};
use crate::application::history::HistorySidecar;
use crate::application::tooling::ToolRegistry;
use crate::model::{ModelError, ModelProvider, ModelRequest};
use crate::types::{ChatMessage, Params};

const RETRY_NOTE: &str = "Your previous reply could not be produced. Please answer again, \
either as plain text or as a single fenced YAML action block.";

/// One identity, its tools and its conversation, driven by [`Agent::run`].
pub struct Agent {
    identity: String,
    description: String,
    provider: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    human: Arc<dyn HumanInput>,
    history: Option<HistorySidecar>,
    options: AgentOptions,
    conversation: Conversation,
}

impl Agent {
    pub fn new(
        identity: impl Into<String>,
        description: impl Into<String>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            identity: identity.into(),
            description: description.into(),
            provider,
            tools: ToolRegistry::new(),
            human: Arc::new(NoHumanInput),
            history: None,
            options: AgentOptions::default(),
            conversation: Conversation::new(),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_human_input(mut self, human: Arc<dyn HumanInput>) -> Self {
        self.human = human;
        self
    }

    pub fn with_history(mut self, history: HistorySidecar) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Runs one task to completion.
    ///
    /// Every failure inside the loop is turned into an observation or a
    /// degraded answer, so the caller always receives text.
    pub async fn run(&mut self, task: impl Into<String>) -> AgentOutcome {
        let task = task.into();
        info!(agent = %self.identity, "Agent task started");

        self.conversation = match &self.history {
            Some(history) => Conversation::from_messages(history.load()),
            None => Conversation::new(),
        };
        let system_prompt =
            compose_system_prompt(&self.identity, &self.description, &task, &self.tools.describe());
        self.conversation.append(ChatMessage::user(task));
        self.bound_conversation();
        self.persist();

        let outcome = self.drive(&system_prompt).await;
        if let Some(history) = &self.history {
            history.flush().await;
        }
        info!(
            agent = %self.identity,
            status = ?outcome.status,
            depth = outcome.depth,
            steps = outcome.steps.len(),
            "Agent task finished"
        );
        outcome
    }

    async fn drive(&mut self, system_prompt: &str) -> AgentOutcome {
        let mut steps = Vec::new();
        let mut depth = 0;

        loop {
            if let Some(ceiling) = self.options.max_depth
                && depth >= ceiling
            {
                warn!(agent = %self.identity, depth, "Agent reached its depth ceiling");
                return finish(DEPTH_EXCEEDED_RESPONSE, TaskStatus::DepthExceeded, steps, depth);
            }
            depth += 1;

            let reply = match self.prompt_model(system_prompt).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(agent = %self.identity, %err, depth, "Model backend unavailable");
                    return finish(FALLBACK_RESPONSE, TaskStatus::ModelUnavailable, steps, depth);
                }
            };
            self.conversation.append(ChatMessage::model(reply.clone()));
            self.persist();

            match AgentDirective::from_response(&reply) {
                AgentDirective::Final { response } => {
                    debug!(agent = %self.identity, depth, "No action in reply, final answer");
                    return finish(response, TaskStatus::Answered, steps, depth);
                }
                AgentDirective::PassResult { result } => {
                    info!(agent = %self.identity, depth, "Agent passed its result");
                    if let Some(history) = &self.history {
                        history.write_output(result.clone());
                    }
                    return finish(result, TaskStatus::Passed, steps, depth);
                }
                AgentDirective::AskUser { question } => {
                    info!(agent = %self.identity, %question, "Agent asked the user");
                    let message = match self.human.ask(&question).await {
                        Ok(answer) => ChatMessage::user(answer),
                        Err(err) => {
                            warn!(agent = %self.identity, %err, "Human input unavailable");
                            ChatMessage::observation(ASK_USER, failure_text(ASK_USER, &err))
                        }
                    };
                    self.observe(message);
                }
                AgentDirective::CallTool { tool, params } => {
                    info!(agent = %self.identity, %tool, depth, "Agent requested tool execution");
                    let step = self.call_tool(&tool, params).await;
                    let text = if step.success {
                        format!("Here is your tool response:\n\n{}", step.output)
                    } else {
                        failure_text(&step.tool, &step.output)
                    };
                    self.observe(ChatMessage::observation(step.tool.clone(), text));
                    steps.push(step);
                }
            }
        }
    }

    async fn call_tool(&self, tool: &str, params: Params) -> AgentStep {
        match self.tools.execute(tool, params.clone()).await {
            Ok(execution) => AgentStep {
                output: execution.output_text(),
                tool: execution.tool,
                params: execution.input,
                success: true,
            },
            Err(err) => AgentStep {
                tool: err.tool().to_string(),
                params,
                success: false,
                output: err.to_string(),
            },
        }
    }

    async fn prompt_model(&self, system_prompt: &str) -> Result<String, ModelError> {
        prompt_with_retries(
            self.provider.as_ref(),
            ModelRequest {
                model: self.options.model.clone(),
                system_prompt: system_prompt.to_string(),
                messages: self.conversation.snapshot(),
            },
            self.options.model_retries,
        )
        .await
    }

    fn observe(&mut self, message: ChatMessage) {
        self.conversation.append(message);
        self.bound_conversation();
        self.persist();
    }

    fn bound_conversation(&mut self) {
        let dropped = self.conversation.truncate(self.options.max_messages);
        if dropped > 0 {
            debug!(agent = %self.identity, dropped, "Truncated conversation");
        }
    }

    fn persist(&self) {
        if let Some(history) = &self.history {
            history.save_snapshot(self.conversation.snapshot());
        }
    }
}

/// Sends `request`, retrying up to `retries` more times with a nudge appended.
/// The nudge only lives in the retried request, never in a conversation.
pub(crate) async fn prompt_with_retries(
    provider: &dyn ModelProvider,
    request: ModelRequest,
    retries: usize,
) -> Result<String, ModelError> {
    let mut attempt = 0;
    loop {
        let mut request = request.clone();
        if attempt > 0 {
            request.messages.push(ChatMessage::user(RETRY_NOTE));
        }
        match provider.chat(request).await {
            Ok(response) => return Ok(response.text()),
            Err(err) if attempt < retries => {
                attempt += 1;
                warn!(%err, attempt, "Model call failed, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

fn failure_text(tool: &str, err: &impl std::fmt::Display) -> String {
    format!("The tool '{tool}' failed with error: {err}")
}

fn finish(
    response: impl Into<String>,
    status: TaskStatus,
    steps: Vec<AgentStep>,
    depth: usize,
) -> AgentOutcome {
    AgentOutcome {
        response: response.into(),
        status,
        steps,
        depth,
    }
}
