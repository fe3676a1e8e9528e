//! Data models for rowfill.

mod dataset;

pub use dataset::{ColumnStats, Dataset, DatasetError, Record};
