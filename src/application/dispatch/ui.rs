use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

pub const DEFAULT_UI_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Text,
}

impl WidgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::Text => "text",
        }
    }
}

/// Side effect requested by the orchestration layer for the display shell.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    CreateWidget {
        kind: WidgetKind,
        title: String,
        text: String,
    },
    PrintToOutput(String),
    UpdateStatus(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UiQueueError {
    #[error("UI command queue is full")]
    Full,
    #[error("UI command queue is closed")]
    Closed,
}

/// Sending half of the bounded UI command channel.
#[derive(Debug, Clone)]
pub struct UiQueue {
    commands: mpsc::Sender<UiCommand>,
}

pub fn ui_channel(capacity: usize) -> (UiQueue, mpsc::Receiver<UiCommand>) {
    let (commands, receiver) = mpsc::channel(capacity.max(1));
    (UiQueue { commands }, receiver)
}

impl UiQueue {
    /// Queues without waiting; a full queue is reported instead of blocking.
    pub fn enqueue(&self, command: UiCommand) -> Result<(), UiQueueError> {
        self.commands.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => UiQueueError::Full,
            mpsc::error::TrySendError::Closed(_) => UiQueueError::Closed,
        })
    }

    pub async fn send(&self, command: UiCommand) -> Result<(), UiQueueError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| UiQueueError::Closed)
    }
}

/// Drains `commands` until every sender is gone and returns how many were
/// handled. This is the only consumer of the queue.
pub async fn drain_ui_commands<F>(mut commands: mpsc::Receiver<UiCommand>, mut render: F) -> usize
where
    F: FnMut(&UiCommand),
{
    let mut handled = 0;
    while let Some(command) = commands.recv().await {
        render(&command);
        handled += 1;
    }
    handled
}

pub fn spawn_console_renderer(commands: mpsc::Receiver<UiCommand>) -> JoinHandle<usize> {
    tokio::spawn(drain_ui_commands(commands, log_ui_command))
}

pub fn log_ui_command(command: &UiCommand) {
    match command {
        UiCommand::CreateWidget { kind, title, text } => {
            info!(kind = kind.as_str(), %title, "Widget created");
            println!("[{title}]\n{text}");
        }
        UiCommand::PrintToOutput(text) => println!("{text}"),
        UiCommand::UpdateStatus(status) => info!(%status, "Status updated"),
    }
}
