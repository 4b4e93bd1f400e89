use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "unison-agent",
    version,
    about = "Orchestrates model-driven agents and tools"
)]
pub struct Cli {
    /// Configuration file (defaults to config/agents.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Model id overriding the configured one.
    #[arg(long, global = true)]
    pub model: Option<String>,
    /// Wipe stored conversation history before starting.
    #[arg(long, global = true)]
    pub fresh_history: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// One orchestrator turn; prints the answer.
    Run {
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        prompt: Vec<String>,
    },
    /// One task against a single configured agent.
    Agent {
        identity: String,
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        prompt: Vec<String>,
    },
    /// Interactive console session (the default).
    Repl,
}
