use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::agent::{
    AgentOptions, Conversation, DEPTH_EXCEEDED_RESPONSE, FALLBACK_RESPONSE, parse_all,
    prompt_with_retries,
};
use crate::application::dispatch::{DispatchCall, Dispatcher, UiCommand, UiQueue};
use crate::model::{ModelProvider, ModelRequest};
use crate::types::ChatMessage;

pub const EMPTY_PROMPT_RESPONSE: &str = "Please provide a prompt or a file.";

pub const DEFAULT_ORCHESTRATOR_PROMPT: &str = "You are Unison, a helpful assistant. \
Answer directly when you can and delegate work to the agents and tools below when you cannot.";

/// Long-lived conversation in which a single model reply may request several
/// actions; they are dispatched together and observed in call order.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    dispatcher: Dispatcher,
    system_prompt: String,
    options: AgentOptions,
    conversation: Conversation,
    ui: Option<UiQueue>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ModelProvider>, dispatcher: Dispatcher) -> Self {
        Self {
            provider,
            dispatcher,
            system_prompt: DEFAULT_ORCHESTRATOR_PROMPT.to_string(),
            options: AgentOptions::default(),
            conversation: Conversation::new(),
            ui: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    /// Status updates are pushed here while actions run.
    pub fn with_ui(mut self, ui: UiQueue) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn reset(&mut self) {
        self.conversation = Conversation::new();
    }

    pub fn system_instructions(&self) -> String {
        compose_orchestrator_prompt(&self.system_prompt, &self.dispatcher.describe())
    }

    /// Answers `prompt`, dispatching whatever the model asks for along the way.
    /// Failures come back as apologetic text, never as errors.
    pub async fn generate(&mut self, prompt: &str) -> String {
        if prompt.trim().is_empty() {
            debug!("Ignoring empty prompt");
            return EMPTY_PROMPT_RESPONSE.to_string();
        }
        self.conversation.append(ChatMessage::user(prompt));
        self.bound_conversation();
        let system_prompt = self.system_instructions();
        let mut depth = 0;

        loop {
            if let Some(ceiling) = self.options.max_depth
                && depth >= ceiling
            {
                warn!(depth, "Orchestrator reached its depth ceiling");
                self.notify(UiCommand::UpdateStatus("Stopped".into()));
                return DEPTH_EXCEEDED_RESPONSE.to_string();
            }
            depth += 1;

            let request = ModelRequest {
                model: self.options.model.clone(),
                system_prompt: system_prompt.clone(),
                messages: self.conversation.snapshot(),
            };
            let reply = match prompt_with_retries(
                self.provider.as_ref(),
                request,
                self.options.model_retries,
            )
            .await
            {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(%err, depth, "Orchestrator could not reach the model");
                    self.notify(UiCommand::UpdateStatus("Error".into()));
                    return FALLBACK_RESPONSE.to_string();
                }
            };
            self.conversation.append(ChatMessage::model(reply.clone()));

            let calls: Vec<DispatchCall> = parse_all(&reply)
                .into_iter()
                .map(DispatchCall::from)
                .collect();
            if calls.is_empty() {
                info!(depth, "Orchestrator produced a final answer");
                self.notify(UiCommand::UpdateStatus("Ready".into()));
                return reply;
            }

            let names: Vec<&str> = calls.iter().map(|call| call.name.as_str()).collect();
            info!(depth, actions = ?names, "Orchestrator dispatching actions");
            self.notify(UiCommand::UpdateStatus(format!("Running {}", names.join(", "))));

            for result in self.dispatcher.dispatch_all(calls).await {
                let text =
                    format!("Here is the response from '{}':\n\n{}", result.name, result.output);
                self.conversation.append(ChatMessage::observation(result.name, text));
            }
            self.bound_conversation();
        }
    }

    fn bound_conversation(&mut self) {
        let dropped = self.conversation.truncate(self.options.max_messages);
        if dropped > 0 {
            debug!(dropped, "Truncated orchestrator conversation");
        }
    }

    fn notify(&self, command: UiCommand) {
        if let Some(ui) = &self.ui
            && let Err(err) = ui.enqueue(command)
        {
            debug!(%err, "Dropped UI status update");
        }
    }
}

fn compose_orchestrator_prompt(base: &str, listing: &str) -> String {
    format!(
        "{}\n\n## Available agents and tools\n{listing}\n\n## Responding\n\
To use an agent or tool, include a fenced YAML block for each call:\n\n\
```yaml\nthoughts: <why>\nname: <agent or tool name>\nparams:\n  <parameter>: <value>\n```\n\n\
You may include several blocks in one reply when the calls are independent; they run \
at the same time and their responses come back in the same order. \
A reply without any block is your final answer to the user.\n",
        base.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch::ui_channel;
    use crate::application::tooling::{FnTool, ToolSpec};
    use crate::model::{ModelError, ModelResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct Script {
        replies: Arc<Mutex<Vec<Option<String>>>>,
        seen: Arc<Mutex<Vec<ModelRequest>>>,
    }

    impl Script {
        fn new(replies: Vec<Option<&str>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(
                    replies.into_iter().map(|r| r.map(String::from)).collect(),
                )),
                seen: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for Script {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
            self.seen.lock().await.push(request);
            let mut replies = self.replies.lock().await;
            match (!replies.is_empty()).then(|| replies.remove(0)).flatten() {
                Some(text) => Ok(ModelResponse {
                    message: ChatMessage::model(text),
                }),
                None => Err(ModelError::InvalidResponse("unavailable".into())),
            }
        }
    }

    fn block(name: &str, params: &str) -> String {
        format!("```yaml\nthoughts: go\nname: {name}\nparams: {params}\n```")
    }

    fn dispatcher() -> Dispatcher {
        let upper = FnTool::blocking(ToolSpec::new("upper", "Uppercases text."), |params| {
            let text = params.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        });
        Dispatcher::default().with_tool(Arc::new(upper))
    }

    #[tokio::test]
    async fn blank_prompt_skips_the_model() {
        let script = Script::new(vec![]);
        let mut orchestrator = Orchestrator::new(Arc::new(script.clone()), dispatcher());

        assert_eq!(orchestrator.generate("   ").await, EMPTY_PROMPT_RESPONSE);
        assert!(script.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn multiple_blocks_are_dispatched_and_observed_in_order() {
        let reply = format!(
            "Doing both.\n{}\n{}",
            block("upper", "{text: one}"),
            block("lower", "{text: two}")
        );
        let script = Script::new(vec![Some(reply.as_str()), Some("ONE, and lower is unknown.")]);
        let (ui, mut statuses) = ui_channel(8);
        let mut orchestrator =
            Orchestrator::new(Arc::new(script.clone()), dispatcher()).with_ui(ui);

        let answer = orchestrator.generate("shout").await;

        assert_eq!(answer, "ONE, and lower is unknown.");
        let seen = script.seen.lock().await;
        assert_eq!(seen.len(), 2);
        let observed: Vec<String> = seen[1]
            .messages
            .iter()
            .filter(|m| m.is_observation())
            .map(ChatMessage::render)
            .collect();
        assert_eq!(
            observed,
            vec![
                "Here is the response from 'upper':\n\nONE".to_string(),
                "Here is the response from 'lower':\n\nUnknown function called.".to_string(),
            ]
        );
        assert!(seen[0].system_prompt.contains("NAME: upper"));
        assert_eq!(
            statuses.recv().await,
            Some(UiCommand::UpdateStatus("Running upper, lower".into()))
        );
    }

    #[tokio::test]
    async fn model_failure_returns_fallback() {
        let script = Script::new(vec![None, None, None]);
        let mut orchestrator = Orchestrator::new(Arc::new(script.clone()), dispatcher());

        assert_eq!(orchestrator.generate("hello").await, FALLBACK_RESPONSE);
        assert_eq!(script.seen.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn conversation_carries_across_prompts() {
        let script = Script::new(vec![Some("Hi!"), Some("Still here.")]);
        let mut orchestrator = Orchestrator::new(Arc::new(script.clone()), dispatcher());

        orchestrator.generate("hello").await;
        orchestrator.generate("again").await;

        let seen = script.seen.lock().await;
        assert_eq!(seen[1].messages.len(), 3);
        assert_eq!(orchestrator.conversation().len(), 4);
    }

    #[tokio::test]
    async fn repl_turns_stay_within_the_message_bound() {
        let script = Script::new(vec![Some("one"), Some("two"), Some("three"), Some("four")]);
        let mut orchestrator = Orchestrator::new(Arc::new(script.clone()), dispatcher())
            .with_options(AgentOptions {
                max_messages: 5,
                ..AgentOptions::default()
            });

        for prompt in ["a", "b", "c", "d"] {
            orchestrator.generate(prompt).await;
        }

        let seen = script.seen.lock().await;
        assert!(seen.iter().all(|request| request.messages.len() <= 5));
        assert_eq!(seen[3].messages.len(), 4);
        assert_eq!(seen[3].messages.first(), Some(&ChatMessage::user("a")));
        assert_eq!(seen[3].messages.last(), Some(&ChatMessage::user("d")));
        assert!(orchestrator.conversation().len() <= 5);
    }
}
