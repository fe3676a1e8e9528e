//! Types shared across annotation backends.

use std::path::PathBuf;

use thiserror::Error;

/// What an annotator needs to process one row, built from the row's source
/// fields before any network call is made.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    /// A resource reference handed to the service (e.g. an image URL).
    Reference(String),
    /// A local file whose bytes are sent to the service.
    File(PathBuf),
    /// A text prompt for a generator.
    Prompt(String),
    /// Nothing beyond the row index.
    Index,
}

/// A transient unit of work: one row and its request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub index: usize,
    pub payload: RequestPayload,
}

impl WorkItem {
    pub fn new(index: usize, payload: RequestPayload) -> Self {
        Self { index, payload }
    }
}

/// Result of a single successful annotation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationOutput {
    /// Annotation produced a value to record.
    Data(String),
    /// The service answered but had nothing to report (e.g. zero captions).
    /// Terminal, and distinct from "not yet tried".
    NoResult,
}

impl AnnotationOutput {
    /// Normalize a raw value: empty text becomes `NoResult`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            AnnotationOutput::NoResult
        } else {
            AnnotationOutput::Data(text)
        }
    }

    /// The string written into the derived column.
    pub fn into_cell(self) -> String {
        match self {
            AnnotationOutput::Data(value) => value,
            AnnotationOutput::NoResult => String::new(),
        }
    }
}

/// Errors from annotation backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnnotationError {
    /// The call did not complete: connection refused, timeout, non-success status.
    #[error("Service error: {0}")]
    Transient(String),

    /// The service answered with a success status but the body is unusable.
    #[error("Unusable response: {0}")]
    Unusable(String),

    /// The row cannot produce a request (missing field or file).
    #[error("Missing input: {0}")]
    MissingInput(String),
}

impl AnnotationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AnnotationError::MissingInput(_))
    }
}
