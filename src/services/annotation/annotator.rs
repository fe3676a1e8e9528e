//! Annotator trait: shared abstraction for annotation backends.

use async_trait::async_trait;

use crate::models::Record;

use super::types::{AnnotationError, AnnotationOutput, WorkItem};

/// A backend that can annotate one dataset row.
///
/// Implementations wrap a specific inference boundary (caption service, OCR
/// service, image generator, local file check) and expose it through a
/// uniform interface so the enrichment driver can orchestrate them
/// identically. Implementations never retry and never touch the dataset.
#[async_trait]
pub trait Annotator: Send + Sync {
    /// Short name used in logs and CLI output.
    fn name(&self) -> &str;

    /// Derived column this annotator fills when none is given.
    fn default_column(&self) -> &str;

    /// Source columns that must exist before any row is processed.
    fn required_columns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the backend is reachable.
    async fn is_available(&self) -> bool;

    /// Human-readable reason when `is_available` returns false.
    fn availability_hint(&self) -> String;

    /// Build the request for one row from its source fields.
    fn prepare(&self, record: &Record<'_>) -> Result<WorkItem, AnnotationError>;

    /// Perform one call for a prepared row.
    async fn annotate(&self, item: &WorkItem) -> Result<AnnotationOutput, AnnotationError>;
}
