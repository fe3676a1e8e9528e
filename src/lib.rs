//! rowfill - incremental, resumable enrichment of tabular datasets.
//!
//! Rows of a table are sent one at a time to an external inference service
//! (captioning, OCR, image generation) and the answer is written back into a
//! derived column. Rows that already hold a value are never reprocessed, so
//! an interrupted run resumes where it stopped.

pub mod config;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use models::{Dataset, Record};
pub use services::{EnrichConfig, EnrichmentDriver, RowRange, RunSummary};
pub use store::{TabularStore, TsvStore};
