use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines,
};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::info;

#[derive(Debug, Error)]
pub enum HumanInputError {
    #[error("no human input channel is attached")]
    Unavailable,
    #[error("human input channel closed")]
    Closed,
    #[error("failed to read human input: {0}")]
    Io(#[from] std::io::Error),
}

/// Channel used by the `ask_user` control action.
#[async_trait]
pub trait HumanInput: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, HumanInputError>;
}

/// Default channel for agents that were not given one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHumanInput;

#[async_trait]
impl HumanInput for NoHumanInput {
    async fn ask(&self, _question: &str) -> Result<String, HumanInputError> {
        Err(HumanInputError::Unavailable)
    }
}

type SharedLines = Arc<Mutex<Lines<Box<dyn AsyncBufRead + Send + Unpin>>>>;
type SharedOutput = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Console line reader shared by the REPL and every agent's `ask_user`, so
/// prompts and replies are consumed from a single buffer.
#[derive(Clone)]
pub struct ConsoleInput {
    lines: SharedLines,
    output: SharedOutput,
}

impl ConsoleInput {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }

    pub fn new<R, W>(reader: R, output: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(reader);
        Self {
            lines: Arc::new(Mutex::new(reader.lines())),
            output: Arc::new(Mutex::new(Box::new(output))),
        }
    }

    /// Prints `prompt` and reads one line; `None` at end of input.
    pub async fn read_line(&self, prompt: &str) -> Result<Option<String>, HumanInputError> {
        let mut lines = self.lines.lock().await;
        self.write(prompt).await?;
        Ok(lines.next_line().await?)
    }

    /// Reads every remaining line, joined with newlines.
    pub async fn read_to_end(&self) -> Result<String, HumanInputError> {
        let mut lines = self.lines.lock().await;
        let mut collected = Vec::new();
        while let Some(line) = lines.next_line().await? {
            collected.push(line);
        }
        Ok(collected.join("\n"))
    }

    pub async fn write(&self, text: &str) -> std::io::Result<()> {
        let mut output = self.output.lock().await;
        output.write_all(text.as_bytes()).await?;
        output.flush().await
    }
}

#[async_trait]
impl HumanInput for ConsoleInput {
    async fn ask(&self, question: &str) -> Result<String, HumanInputError> {
        info!(question, "Agent is waiting for human input");
        self.read_line(&format!("QUESTION: {question}\nYou: "))
            .await?
            .ok_or(HumanInputError::Closed)
    }
}

/// Question forwarded to whoever drains a [`ChannelHumanInput`].
#[derive(Debug)]
pub struct HumanRequest {
    pub question: String,
    pub reply: oneshot::Sender<String>,
}

/// `ask_user` bridged onto a channel, for embedding the loop behind a UI.
#[derive(Clone)]
pub struct ChannelHumanInput {
    requests: mpsc::Sender<HumanRequest>,
}

pub fn human_channel(capacity: usize) -> (ChannelHumanInput, mpsc::Receiver<HumanRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelHumanInput { requests: tx }, rx)
}

#[async_trait]
impl HumanInput for ChannelHumanInput {
    async fn ask(&self, question: &str) -> Result<String, HumanInputError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(HumanRequest {
                question: question.to_string(),
                reply,
            })
            .await
            .map_err(|_| HumanInputError::Closed)?;
        answer.await.map_err(|_| HumanInputError::Closed)
    }
}
