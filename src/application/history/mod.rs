mod error;
mod sidecar;
mod store;

pub use error::HistoryError;
pub use sidecar::{DEFAULT_PERSISTENCE_WORKERS, HistorySidecar, WriteBehindPool};
pub use store::{FileHistoryStore, HistoryStore, MemoryHistoryStore};
