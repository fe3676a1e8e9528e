//! Annotation backends: trait-based abstraction over the services that fill
//! a derived column.
//!
//! Each backend (captioning, OCR, image linking, image synthesis) implements
//! the `Annotator` trait. The enrichment driver works with any of them.

mod annotator;
mod caption;
mod image_path;
mod ocr;
mod synthesis;
mod types;

pub use annotator::Annotator;
pub use caption::{format_captions, reference_url, Caption, CaptionAnnotator};
pub use image_path::{image_filename, relative_image_path, ImagePathAnnotator};
pub use ocr::{usable_text, OcrAnnotator};
pub use synthesis::{build_prompt, HttpSynthesizer, ImageSynthesizer, SynthesisAnnotator};
pub use types::{AnnotationError, AnnotationOutput, RequestPayload, WorkItem};
