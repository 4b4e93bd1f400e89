// Orchestration tests - one model turn fanning out to agents, tools and the UI queue.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use unison_agent::agent::{FALLBACK_RESPONSE, NoHumanInput};
use unison_agent::assembly::AgentFactory;
use unison_agent::config::{AgentConfig, AppConfig};
use unison_agent::dispatch::{UiCommand, WidgetKind, drain_ui_commands, ui_channel};
use unison_agent::history::MemoryHistoryStore;
use unison_agent::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use unison_agent::types::ChatMessage;

/// Answers by looking at who is asking: the orchestrator's prompt lists the
/// dispatch targets, agents' prompts start with their identity.
struct Router {
    orchestrator_turns: Mutex<usize>,
}

#[async_trait]
impl ModelProvider for Router {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let text = if request.system_prompt.starts_with("You are Web Crawler.") {
            "```yaml\nthoughts: hand back\nname: pass_result\nparams:\n  result: Pune is 31C and clear.\n```".to_string()
        } else if request.system_prompt.starts_with("You are Broken Agent.") {
            return Err(ModelError::InvalidResponse("offline".into()));
        } else {
            let mut turns = self.orchestrator_turns.lock().expect("turns");
            *turns += 1;
            if *turns == 1 {
                [
                    "On it.",
                    "```yaml\nthoughts: live data\nname: Web_Crawler\nparams:\n  prompt: weather in Pune\n```",
                    "```yaml\nthoughts: show it\nname: create_text_widget\nparams:\n  text: Weather lookup started\n```",
                    "```yaml\nthoughts: also ask\nname: Broken_Agent\nparams:\n  prompt: anything\n```",
                ]
                .join("\n")
            } else {
                let observed: Vec<String> = request
                    .messages
                    .iter()
                    .filter(|m| m.is_observation())
                    .map(ChatMessage::render)
                    .collect();
                format!("Summary of {} results.", observed.len())
            }
        };
        Ok(ModelResponse {
            message: ChatMessage::model(text),
        })
    }
}

fn config() -> AppConfig {
    let agent = |identity: &str| AgentConfig {
        identity: identity.into(),
        description: format!("{identity} does its job."),
        tools: Vec::new(),
        output_file: None,
    };
    AppConfig {
        history_dir: None,
        model_retries: 0,
        agents: vec![agent("Web Crawler"), agent("Broken Agent")],
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn one_turn_fans_out_and_observes_results_in_order() {
    let provider = Arc::new(Router {
        orchestrator_turns: Mutex::new(0),
    });
    let store = Arc::new(MemoryHistoryStore::new());
    let factory =
        AgentFactory::new(config(), provider, Arc::new(NoHumanInput)).with_store(store.clone());
    let (ui, commands) = ui_channel(8);
    let mut orchestrator = factory.build_orchestrator(ui);

    let answer = orchestrator.generate("What's the weather in Pune?").await;

    assert_eq!(answer, "Summary of 3 results.");
    let observed: Vec<String> = orchestrator
        .conversation()
        .messages()
        .iter()
        .filter(|m| m.is_observation())
        .map(ChatMessage::render)
        .collect();
    assert_eq!(
        observed,
        vec![
            "Here is the response from 'Web_Crawler':\n\nPune is 31C and clear.".to_string(),
            "Here is the response from 'create_text_widget':\n\nSuccessfully queued the creation of a text widget with title 'INFORMATION'.".to_string(),
            format!("Here is the response from 'Broken_Agent':\n\n{FALLBACK_RESPONSE}"),
        ]
    );
    assert_eq!(
        store.outputs(),
        vec![("Web Crawler".to_string(), "Pune is 31C and clear.".to_string())]
    );

    drop(orchestrator);
    let mut widgets = Vec::new();
    drain_ui_commands(commands, |command| {
        if let UiCommand::CreateWidget { kind, title, text } = command {
            widgets.push((*kind, title.clone(), text.clone()));
        }
    })
    .await;
    assert_eq!(
        widgets,
        vec![(
            WidgetKind::Text,
            "INFORMATION".to_string(),
            "Weather lookup started".to_string()
        )]
    );
}
