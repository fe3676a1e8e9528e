//! OCR annotator: uploads a row's image to a Tika-style text extraction server.
//!
//! The image bytes are sent with `PUT` and headers declaring the content
//! type and OCR language; the server answers with plain text. Some servers
//! answer an unparseable upload with an HTML error page and a 200 status,
//! which is treated as an unusable response rather than a caption.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::{ImageConfig, OcrConfig};
use crate::models::Record;

use super::annotator::Annotator;
use super::types::{AnnotationError, AnnotationOutput, RequestPayload, WorkItem};

/// Interpret an OCR response body.
///
/// Returns `None` when the body carries no usable text (empty, or an HTML page).
pub fn usable_text(body: &str) -> Option<&str> {
    let text = body.trim();
    if text.is_empty() || text.to_lowercase().starts_with("<!doctype html") {
        None
    } else {
        Some(text)
    }
}

/// Annotator backed by an OCR HTTP service.
pub struct OcrAnnotator {
    client: Client,
    ocr: OcrConfig,
    path_column: String,
    image_dir: PathBuf,
}

impl OcrAnnotator {
    pub fn new(
        ocr: OcrConfig,
        images: &ImageConfig,
        image_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            ocr,
            path_column: images.path_column.clone(),
            image_dir,
        })
    }
}

#[async_trait]
impl Annotator for OcrAnnotator {
    fn name(&self) -> &str {
        "ocr"
    }

    fn default_column(&self) -> &str {
        &self.ocr.column
    }

    fn required_columns(&self) -> Vec<String> {
        vec![self.path_column.clone()]
    }

    async fn is_available(&self) -> bool {
        match self.client.get(&self.ocr.endpoint).send().await {
            Ok(resp) => !resp.status().is_server_error(),
            Err(_) => false,
        }
    }

    fn availability_hint(&self) -> String {
        format!(
            "OCR server not reachable at {} (e.g. docker run -d -p 9998:9998 apache/tika:latest-full)",
            self.ocr.endpoint
        )
    }

    fn prepare(&self, record: &Record<'_>) -> Result<WorkItem, AnnotationError> {
        let filename = record
            .get(&self.path_column)
            .and_then(|p| Path::new(p.trim()).file_name())
            .ok_or_else(|| {
                AnnotationError::MissingInput(format!(
                    "row {} has no {}",
                    record.index(),
                    self.path_column
                ))
            })?;
        Ok(WorkItem::new(
            record.index(),
            RequestPayload::File(self.image_dir.join(filename)),
        ))
    }

    async fn annotate(&self, item: &WorkItem) -> Result<AnnotationOutput, AnnotationError> {
        let RequestPayload::File(ref path) = item.payload else {
            return Err(AnnotationError::MissingInput(
                "OCR requests need an image file".to_string(),
            ));
        };

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AnnotationError::MissingInput(format!("{}: {}", path.display(), e)))?;

        debug!(
            "OCR for row {} ({} bytes from {})",
            item.index,
            bytes.len(),
            path.display()
        );
        let response = self
            .client
            .put(&self.ocr.endpoint)
            .header("Content-type", &self.ocr.content_type)
            .header("Accept", "text/plain")
            .header("X-Tika-OCRLanguage", &self.ocr.language)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AnnotationError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnnotationError::Transient(format!(
                "OCR server returned HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnnotationError::Transient(format!("reading body: {}", e)))?;

        match usable_text(&body) {
            Some(text) => Ok(AnnotationOutput::Data(text.to_string())),
            None => Err(AnnotationError::Unusable(
                "OCR server returned no text".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_text() {
        assert_eq!(usable_text("  GHOST TOURS\n"), Some("GHOST TOURS"));
        assert_eq!(usable_text(""), None);
        assert_eq!(usable_text("\n \t"), None);
        assert_eq!(usable_text("<!DOCTYPE html><html></html>"), None);
        assert_eq!(usable_text("  <!doctype HTML>"), None);
    }

    #[test]
    fn test_prepare_resolves_file_in_image_dir() {
        let annotator = OcrAnnotator::new(
            OcrConfig::default(),
            &ImageConfig::default(),
            PathBuf::from("/data/images"),
            Duration::from_secs(1),
        )
        .unwrap();
        let ds = crate::models::Dataset::from_parts(
            vec!["ai_image_path".to_string()],
            vec![vec![Some("images/haunted_image_3.png".to_string())]],
        )
        .unwrap();
        let item = annotator.prepare(&ds.record(0).unwrap()).unwrap();
        assert_eq!(
            item.payload,
            RequestPayload::File(PathBuf::from("/data/images/haunted_image_3.png"))
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_missing_input() {
        let annotator = OcrAnnotator::new(
            OcrConfig::default(),
            &ImageConfig::default(),
            PathBuf::from("/nonexistent"),
            Duration::from_secs(1),
        )
        .unwrap();
        let item = WorkItem::new(0, RequestPayload::File(PathBuf::from("/nonexistent/x.png")));
        assert!(matches!(
            annotator.annotate(&item).await,
            Err(AnnotationError::MissingInput(_))
        ));
    }
}
