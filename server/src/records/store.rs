//! Whole-file JSON snapshot persistence for user records.
//!
//! The store is one JSON object mapping user key -> record document at
//! `{data_dir}/database.json`, read in full and rewritten in full on every
//! mutation. A missing or corrupt file loads as the empty store.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// In-memory form of the snapshot: user key -> record document.
pub type Records = Map<String, Value>;

/// Errors from rewriting the snapshot. Read failures are not errors: an
/// unreadable snapshot is the empty store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle to the snapshot file. Clones share one async mutex; every
/// load-modify-save sequence must hold [`RecordStore::lock`] so that no two
/// writers interleave between the read and the write.
#[derive(Clone)]
pub struct RecordStore {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl RecordStore {
    /// Open the store in `data_dir`, creating the directory if needed.
    /// The snapshot file itself is created lazily on first save.
    pub fn open(data_dir: &str) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let path = Path::new(data_dir).join("database.json");
        tracing::info!("Record store at {}", path.display());

        Ok(Self {
            path: Arc::new(path),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Acquire the single-writer lock. Hold the guard across the whole
    /// load-modify-save sequence.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Read the full snapshot. Synchronous; call from the blocking pool.
    pub fn load(&self) -> Records {
        let bytes = match std::fs::read(self.path.as_ref()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Records::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Snapshot unreadable, treating as empty store"
                );
                return Records::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Snapshot is not a JSON object, treating as empty store"
                );
                Records::new()
            }
        }
    }

    /// Rewrite the full snapshot. Synchronous; call from the blocking pool.
    /// Pretty-printed so the file stays hand-inspectable.
    pub fn save(&self, records: &Records) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        std::fs::write(self.path.as_ref(), bytes)?;
        Ok(())
    }
}
