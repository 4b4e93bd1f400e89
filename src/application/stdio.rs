use thiserror::Error;
use tracing::{debug, info};

use crate::agent::{ConsoleInput, HumanInputError};
use crate::application::orchestrator::Orchestrator;

pub const REPL_PROMPT: &str = ">>> ";

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Input(#[from] HumanInputError),
}

impl StdioError {
    pub fn user_message(&self) -> String {
        match self {
            StdioError::Io(_) => "The console could not be read or written.".to_string(),
            StdioError::Input(err) => format!("Console input stopped: {err}"),
        }
    }
}

/// Interactive loop: each line is one orchestrator turn. `exit`/`quit` or end
/// of input stops the loop, `/reset` starts a fresh conversation.
///
/// `console` must be the same reader handed to agents for `ask_user`.
pub async fn run_repl(
    orchestrator: &mut Orchestrator,
    console: &ConsoleInput,
) -> Result<usize, StdioError> {
    info!("Interactive session started");
    let mut turns = 0;

    while let Some(line) = console.read_line(REPL_PROMPT).await? {
        let prompt = line.trim();
        match prompt {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                orchestrator.reset();
                console.write("Conversation cleared.\n").await?;
                continue;
            }
            _ => {}
        }

        debug!(chars = prompt.len(), "Received console prompt");
        let answer = orchestrator.generate(prompt).await;
        console.write(&format!("{answer}\n")).await?;
        turns += 1;
    }

    info!(turns, "Interactive session ended");
    Ok(turns)
}
