//! In-memory store for dry runs and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{StoreError, TabularStore};
use crate::models::Dataset;

/// Keeps the last saved snapshot in memory.
///
/// `fail_after` makes every save past the given number of successful ones
/// fail, which lets callers exercise checkpoint failure handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Dataset>>,
    saves: AtomicUsize,
    fail_after: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset: Dataset) -> Self {
        Self {
            snapshot: Mutex::new(Some(dataset)),
            ..Self::default()
        }
    }

    pub fn fail_after(mut self, successful_saves: usize) -> Self {
        self.fail_after = Some(successful_saves);
        self
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last persisted snapshot.
    pub fn snapshot(&self) -> Option<Dataset> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

impl TabularStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn exists(&self) -> bool {
        self.snapshot.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    fn load(&self) -> Result<Dataset, StoreError> {
        self.snapshot()
            .ok_or_else(|| StoreError::Other("memory store is empty".to_string()))
    }

    fn save(&self, dataset: &Dataset) -> Result<(), StoreError> {
        if let Some(limit) = self.fail_after {
            if self.saves.load(Ordering::SeqCst) >= limit {
                return Err(StoreError::Other("simulated write failure".to_string()));
            }
        }
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))?;
        *guard = Some(dataset.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
