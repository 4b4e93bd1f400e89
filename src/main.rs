mod cli;

use clap::Parser;
use cli::{Cli, Command};
use std::error::Error;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};
use unison_agent::agent::ConsoleInput;
use unison_agent::assembly::{AgentFactory, reset_history};
use unison_agent::config::AppConfig;
use unison_agent::dispatch::{spawn_console_renderer, ui_channel};
use unison_agent::model::{GeminiClient, ModelProvider};
use unison_agent::stdio::run_repl;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    info!("Starting unison-agent");
    let cli = Cli::parse();
    debug!(command = ?cli.command, config = ?cli.config, "CLI arguments parsed");

    let mut config = AppConfig::load(cli.config.as_deref()).inspect_err(|err| {
        error!(%err, "{}", err.user_message());
    })?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if cli.fresh_history {
        reset_history(&config)?;
    }

    let provider: Arc<dyn ModelProvider> = Arc::new(
        GeminiClient::from_env(&config.gemini_endpoint, &config.model, &config.api_key_env)
            .inspect_err(|err| error!(%err, "{}", err.user_message()))?,
    );
    info!(model = %config.model, agents = config.agents.len(), "Configuration loaded");

    let console = ConsoleInput::stdin();
    let factory = AgentFactory::new(config, provider, Arc::new(console.clone()));
    let (ui, commands) = ui_channel(factory.config().ui_queue_capacity);
    let renderer = spawn_console_renderer(commands);

    match cli.command.unwrap_or(Command::Repl) {
        Command::Run {
            prompt_file,
            prompt,
        } => {
            let prompt = load_prompt(prompt_file.as_deref(), prompt, &console).await?;
            let mut orchestrator = factory.build_orchestrator(ui);
            let answer = orchestrator.generate(&prompt).await;
            println!("{answer}");
        }
        Command::Agent {
            identity,
            prompt_file,
            prompt,
        } => {
            drop(ui);
            let Some(agent_config) = factory.config().agent(&identity).cloned() else {
                error!(%identity, "Agent is not configured");
                return Err(format!("unknown agent '{identity}'").into());
            };
            let prompt = load_prompt(prompt_file.as_deref(), prompt, &console).await?;
            let mut agent = factory.build_agent(&agent_config);
            let outcome = agent.run(prompt).await;
            println!("{}", outcome.response);
        }
        Command::Repl => {
            let mut orchestrator = factory.build_orchestrator(ui);
            if let Err(err) = run_repl(&mut orchestrator, &console).await {
                error!(%err, "{}", err.user_message());
                return Err(err.into());
            }
        }
    }

    if let Ok(rendered) = renderer.await {
        debug!(rendered, "UI renderer stopped");
    }
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(io::stderr)
            .init();
    });
}

async fn load_prompt(
    file: Option<&Path>,
    words: Vec<String>,
    console: &ConsoleInput,
) -> Result<String, Box<dyn Error>> {
    if let Some(path) = file {
        info!(path = %path.display(), "Loading prompt from file");
        return Ok(tokio::fs::read_to_string(path).await?);
    }
    if !words.is_empty() {
        return Ok(words.join(" "));
    }
    debug!("Reading prompt from stdin");
    Ok(console.read_to_end().await?)
}
