//! Enrichment pipeline: select unprocessed rows, annotate them under a retry
//! policy, write results back and checkpoint the dataset as it goes.

mod checkpoint;
mod driver;
mod selector;

pub use checkpoint::Checkpointer;
pub use driver::EnrichmentDriver;
pub use selector::{requeue, select, RowRange};

use std::time::Duration;

use thiserror::Error;

use crate::config::RunConfig;
use crate::models::DatasetError;
use crate::store::StoreError;

/// Errors that end an enrichment run. Per-row failures never surface here.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Checkpoint failed with {rows_at_risk} rows at risk: {source}")]
    Checkpoint {
        rows_at_risk: usize,
        #[source]
        source: StoreError,
    },

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

/// Driver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichConfig {
    /// Rows processed between checkpoints.
    pub batch_size: usize,
    /// Rows in flight at once.
    pub concurrency: usize,
    /// Written for rows that fail permanently; `None` writes an empty value.
    pub failure_marker: Option<String>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for EnrichConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            batch_size: run.batch_size.max(1),
            concurrency: run.concurrency.max(1),
            failure_marker: run.failure_marker.clone(),
        }
    }
}

/// Progress events emitted by the driver.
#[derive(Debug, Clone)]
pub enum EnrichEvent {
    Started {
        column: String,
        total: usize,
    },
    RowStarted {
        index: usize,
    },
    RowCompleted {
        index: usize,
        empty: bool,
        attempts: u32,
    },
    RowFailed {
        index: usize,
        error: String,
        attempts: u32,
    },
    Checkpointed {
        processed: usize,
    },
    Interrupted {
        processed: usize,
        remaining: usize,
    },
    Finished(RunSummary),
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows a result (or failure) was written for.
    pub attempted: usize,
    /// Rows that received a non-empty value.
    pub succeeded: usize,
    /// Rows the service legitimately had nothing for.
    pub empty: usize,
    /// Rows that failed permanently.
    pub failed: usize,
    /// Successful saves, including the final one.
    pub checkpoints: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}
