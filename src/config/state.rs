// Application state module
// Holds the loaded configuration, the file store and request admission

use std::sync::atomic::AtomicBool;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::types::Config;
use crate::storage::FileStore;

/// Application state shared by every connection
pub struct AppState {
    pub config: Config,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,

    /// Upload directory
    pub store: FileStore,

    /// Single permit when requests must be handled one at a time
    request_gate: Option<Semaphore>,
}

impl AppState {
    /// Create `AppState`, opening (and creating if needed) the upload directory
    pub fn new(config: &Config) -> std::io::Result<Self> {
        let store = FileStore::open(&config.storage.upload_dir, config.storage.atomic_writes)?;

        let request_gate = config
            .performance
            .sequential
            .then(|| Semaphore::new(1));

        Ok(Self {
            config: config.clone(),
            cached_access_log: AtomicBool::new(config.logging.access_log),
            store,
            request_gate,
        })
    }

    /// Wait for permission to handle a request.
    ///
    /// Returns `None` immediately in concurrent mode. In sequential mode the
    /// returned permit must be held for the whole request.
    pub async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        match &self.request_gate {
            Some(gate) => gate.acquire().await.ok(),
            None => None,
        }
    }
}
