use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::store::HistoryStore;
use crate::types::ChatMessage;

pub const DEFAULT_PERSISTENCE_WORKERS: usize = 2;

/// Process-wide pool for background storage writes.
///
/// Jobs run on the blocking thread pool, at most `workers` at a time.
#[derive(Clone)]
pub struct WriteBehindPool {
    permits: Arc<Semaphore>,
}

impl WriteBehindPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn submit<F>(&self, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(err) = tokio::task::spawn_blocking(job).await {
                error!(%err, "Background history job did not complete");
            }
        })
    }
}

impl Default for WriteBehindPool {
    fn default() -> Self {
        Self::new(DEFAULT_PERSISTENCE_WORKERS)
    }
}

/// Write-behind persistence for one agent.
///
/// Submissions return immediately. Snapshots carry a generation number and a
/// snapshot older than one already written is dropped, so the last submitted
/// snapshot is the one left in storage.
#[derive(Clone)]
pub struct HistorySidecar {
    inner: Arc<SidecarInner>,
}

struct SidecarInner {
    agent: String,
    store: Arc<dyn HistoryStore>,
    pool: WriteBehindPool,
    generation: AtomicU64,
    written: Mutex<u64>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl HistorySidecar {
    pub fn new(
        agent: impl Into<String>,
        store: Arc<dyn HistoryStore>,
        pool: WriteBehindPool,
    ) -> Self {
        Self {
            inner: Arc::new(SidecarInner {
                agent: agent.into(),
                store,
                pool,
                generation: AtomicU64::new(0),
                written: Mutex::new(0),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn agent(&self) -> &str {
        &self.inner.agent
    }

    /// Reads the stored conversation. Missing or unreadable state yields an
    /// empty history.
    pub fn load(&self) -> Vec<ChatMessage> {
        match self.inner.store.load_snapshot(&self.inner.agent) {
            Ok(Some(messages)) => {
                debug!(
                    agent = %self.inner.agent,
                    messages = messages.len(),
                    "Loaded history snapshot"
                );
                messages
            }
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(agent = %self.inner.agent, %err, "Ignoring unreadable history snapshot");
                Vec::new()
            }
        }
    }

    pub fn save_snapshot(&self, messages: Vec<ChatMessage>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        let handle = self.inner.pool.submit(move || inner.write_snapshot(generation, &messages));
        self.track(handle);
    }

    pub fn write_output(&self, content: String) {
        let inner = self.inner.clone();
        let handle = self.inner.pool.submit(move || {
            if let Err(err) = inner.store.write_output(&inner.agent, &content) {
                error!(agent = %inner.agent, %err, "Background output write failed");
            }
        });
        self.track(handle);
    }

    /// Waits for every write submitted so far.
    pub async fn flush(&self) {
        let handles = match self.inner.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for result in join_all(handles).await {
            if let Err(err) = result {
                error!(agent = %self.inner.agent, %err, "Background history task aborted");
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut pending) = self.inner.pending.lock() {
            pending.retain(|existing| !existing.is_finished());
            pending.push(handle);
        }
    }
}

impl SidecarInner {
    fn write_snapshot(&self, generation: u64, messages: &[ChatMessage]) {
        if generation < self.generation.load(Ordering::SeqCst) {
            debug!(agent = %self.agent, generation, "Skipping superseded snapshot");
            return;
        }
        let Ok(mut written) = self.written.lock() else {
            return;
        };
        if generation < *written {
            debug!(agent = %self.agent, generation, "Skipping superseded snapshot");
            return;
        }
        match self.store.save_snapshot(&self.agent, messages) {
            Ok(()) => *written = generation,
            Err(err) => error!(agent = %self.agent, %err, "Background history save failed"),
        }
    }
}
