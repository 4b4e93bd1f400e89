use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::error::HistoryError;
use crate::types::ChatMessage;

/// Storage for conversation snapshots and final outputs, keyed by agent
/// identity. Implementations are called from blocking worker threads.
pub trait HistoryStore: Send + Sync + 'static {
    fn load_snapshot(&self, agent: &str) -> Result<Option<Vec<ChatMessage>>, HistoryError>;

    fn save_snapshot(&self, agent: &str, messages: &[ChatMessage]) -> Result<(), HistoryError>;

    fn write_output(&self, agent: &str, content: &str) -> Result<(), HistoryError>;
}

/// JSON snapshots under a history directory, one `<identity>.json` per agent,
/// plus optional per-agent output files.
#[derive(Debug, Clone, Default)]
pub struct FileHistoryStore {
    history_dir: Option<PathBuf>,
    outputs: HashMap<String, PathBuf>,
}

impl FileHistoryStore {
    pub fn new(history_dir: impl Into<PathBuf>) -> Self {
        Self {
            history_dir: Some(history_dir.into()),
            outputs: HashMap::new(),
        }
    }

    /// Store that keeps no snapshots; only configured output files are written.
    pub fn outputs_only() -> Self {
        Self::default()
    }

    pub fn with_output_file(mut self, agent: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.outputs.insert(agent.into(), path.into());
        self
    }

    pub fn snapshot_path(&self, agent: &str) -> Option<PathBuf> {
        self.history_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", file_stem(agent))))
    }

    /// Empties the history directory and recreates it.
    pub fn reset(&self) -> Result<(), HistoryError> {
        let Some(dir) = &self.history_dir else {
            return Ok(());
        };
        match fs::remove_dir_all(dir) {
            Ok(()) => info!(path = %dir.display(), "Cleared history directory"),
            Err(source) if source.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(io_error(dir, source)),
        }
        fs::create_dir_all(dir).map_err(|source| io_error(dir, source))
    }
}

impl HistoryStore for FileHistoryStore {
    fn load_snapshot(&self, agent: &str) -> Result<Option<Vec<ChatMessage>>, HistoryError> {
        let Some(path) = self.snapshot_path(agent) else {
            return Ok(None);
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };
        if content.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| HistoryError::Corrupt { path, source })
    }

    fn save_snapshot(&self, agent: &str, messages: &[ChatMessage]) -> Result<(), HistoryError> {
        let Some(path) = self.snapshot_path(agent) else {
            return Ok(());
        };
        let encoded = serde_json::to_string_pretty(messages)?;
        write_atomically(&path, encoded.as_bytes())?;
        debug!(agent, path = %path.display(), messages = messages.len(), "Saved history snapshot");
        Ok(())
    }

    fn write_output(&self, agent: &str, content: &str) -> Result<(), HistoryError> {
        let Some(path) = self.outputs.get(agent) else {
            debug!(agent, "No output file configured; skipping final output write");
            return Ok(());
        };
        write_atomically(path, content.as_bytes())?;
        info!(agent, path = %path.display(), "Wrote final output");
        Ok(())
    }
}

/// In-process store, handy for embedding and for tests.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    snapshots: Mutex<HashMap<String, Vec<ChatMessage>>>,
    outputs: Mutex<Vec<(String, String)>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(self, agent: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(agent.into(), messages);
        }
        self
    }

    pub fn snapshot(&self, agent: &str) -> Option<Vec<ChatMessage>> {
        self.snapshots.lock().ok()?.get(agent).cloned()
    }

    /// Every output write received so far, as `(agent, content)` pairs.
    pub fn outputs(&self) -> Vec<(String, String)> {
        self.outputs
            .lock()
            .map(|outputs| outputs.clone())
            .unwrap_or_default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load_snapshot(&self, agent: &str) -> Result<Option<Vec<ChatMessage>>, HistoryError> {
        Ok(self.snapshot(agent))
    }

    fn save_snapshot(&self, agent: &str, messages: &[ChatMessage]) -> Result<(), HistoryError> {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(agent.to_string(), messages.to_vec());
        }
        Ok(())
    }

    fn write_output(&self, agent: &str, content: &str) -> Result<(), HistoryError> {
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.push((agent.to_string(), content.to_string()));
        }
        Ok(())
    }
}

fn file_stem(agent: &str) -> String {
    agent
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), HistoryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    let staging = path.with_extension("tmp");
    fs::write(&staging, bytes).map_err(|source| io_error(&staging, source))?;
    fs::rename(&staging, path).map_err(|source| {
        warn!(path = %path.display(), "Failed to move staged history file into place");
        io_error(path, source)
    })
}

fn io_error(path: &Path, source: io::Error) -> HistoryError {
    HistoryError::Io {
        path: path.to_path_buf(),
        source,
    }
}
