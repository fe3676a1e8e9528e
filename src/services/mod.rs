//! Service layer: annotation backends, retry and the enrichment driver.
//!
//! Services are free of UI concerns; the CLI consumes their events.

pub mod annotation;
pub mod enrich;
pub mod retry;

pub use annotation::{AnnotationError, AnnotationOutput, Annotator};
pub use enrich::{EnrichConfig, EnrichError, EnrichEvent, EnrichmentDriver, RowRange, RunSummary};
pub use retry::{Attempted, RetryPolicy};
