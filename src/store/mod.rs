//! Persisted tabular storage for datasets.
//!
//! A store loads the whole table and saves the whole table. Saves replace
//! the previous content atomically: a reader sees either the old or the new
//! file, never a partial write.

mod memory;
mod tsv;

pub use memory::MemoryStore;
pub use tsv::{parse_tsv, write_tsv, TsvStore};

use std::path::PathBuf;

use thiserror::Error;

use crate::models::DatasetError;

/// Errors from tabular stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Table not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed table at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Invalid table: {0}")]
    Invalid(#[from] DatasetError),

    #[error("{0}")]
    Other(String),
}

/// A table persisted somewhere durable.
pub trait TabularStore: Send + Sync {
    /// Human-readable location for log output.
    fn describe(&self) -> String;

    /// Whether there is anything to load.
    fn exists(&self) -> bool;

    /// Load the full table.
    fn load(&self) -> Result<crate::models::Dataset, StoreError>;

    /// Replace the persisted table with `dataset`.
    fn save(&self, dataset: &crate::models::Dataset) -> Result<(), StoreError>;
}
