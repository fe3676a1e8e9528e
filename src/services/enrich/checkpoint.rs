//! Periodic persistence of the in-memory dataset.

use tracing::{debug, info};

use crate::models::Dataset;
use crate::store::{StoreError, TabularStore};

/// Saves the dataset through a store every `every` processed rows.
pub struct Checkpointer<'a> {
    store: &'a dyn TabularStore,
    every: usize,
    pending: usize,
    saves: usize,
}

impl<'a> Checkpointer<'a> {
    pub fn new(store: &'a dyn TabularStore, every: usize) -> Self {
        Self {
            store,
            every: every.max(1),
            pending: 0,
            saves: 0,
        }
    }

    /// Count one processed row; saves when the cadence is reached.
    /// Returns whether a save happened.
    pub fn record(&mut self, dataset: &Dataset) -> Result<bool, StoreError> {
        self.pending += 1;
        if self.pending < self.every {
            return Ok(false);
        }
        self.save(dataset)?;
        Ok(true)
    }

    /// Save now, regardless of cadence.
    pub fn save(&mut self, dataset: &Dataset) -> Result<(), StoreError> {
        debug!("Saving {} rows to {}", dataset.len(), self.store.describe());
        self.store.save(dataset)?;
        if self.pending > 0 {
            info!(
                "Checkpoint: saved {} newly processed rows to {}",
                self.pending,
                self.store.describe()
            );
        }
        self.pending = 0;
        self.saves += 1;
        Ok(())
    }

    /// Rows processed since the last successful save.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn saves(&self) -> usize {
        self.saves
    }
}
