//! Image caption annotator: asks a caption service to describe an image.
//!
//! The service is queried with `GET endpoint?url=..&beam_size=..&max_caption_length=..`
//! and answers `{"captions": [{"sentence": "...", "confidence": 0.9}, ...]}`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{CaptionConfig, ImageConfig};
use crate::models::Record;

use super::annotator::Annotator;
use super::types::{AnnotationError, AnnotationOutput, RequestPayload, WorkItem};

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    #[serde(default)]
    captions: Vec<Caption>,
}

/// One caption candidate as returned by the service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Caption {
    pub sentence: String,
    pub confidence: f64,
}

/// Render candidates as `"<text> (confidence: 0.12345)"` joined with `"; "`,
/// in service order.
pub fn format_captions(captions: &[Caption]) -> String {
    captions
        .iter()
        .map(|c| format!("{} (confidence: {:.5})", c.sentence, c.confidence))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Build the URL the caption service fetches: the final path component of
/// the row's image path appended to the public base URL.
pub fn reference_url(base_url: &str, image_path: &str) -> Option<String> {
    let filename = Path::new(image_path.trim()).file_name()?.to_str()?;
    Some(format!("{}/{}", base_url.trim_end_matches('/'), filename))
}

/// Annotator backed by a caption HTTP service.
pub struct CaptionAnnotator {
    client: Client,
    caption: CaptionConfig,
    images: ImageConfig,
}

impl CaptionAnnotator {
    pub fn new(
        caption: CaptionConfig,
        images: ImageConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            caption,
            images,
        })
    }
}

#[async_trait]
impl Annotator for CaptionAnnotator {
    fn name(&self) -> &str {
        "caption"
    }

    fn default_column(&self) -> &str {
        &self.caption.column
    }

    fn required_columns(&self) -> Vec<String> {
        vec![self.images.path_column.clone()]
    }

    async fn is_available(&self) -> bool {
        // Any HTTP answer (even 4xx for a missing url parameter) means the
        // service is up.
        self.client.get(&self.caption.endpoint).send().await.is_ok()
    }

    fn availability_hint(&self) -> String {
        format!("caption service not reachable at {}", self.caption.endpoint)
    }

    fn prepare(&self, record: &Record<'_>) -> Result<WorkItem, AnnotationError> {
        let image_path = record
            .get(&self.images.path_column)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                AnnotationError::MissingInput(format!(
                    "row {} has no {}",
                    record.index(),
                    self.images.path_column
                ))
            })?;
        let url = reference_url(&self.images.base_url, image_path).ok_or_else(|| {
            AnnotationError::MissingInput(format!("unusable image path {:?}", image_path))
        })?;
        Ok(WorkItem::new(
            record.index(),
            RequestPayload::Reference(url),
        ))
    }

    async fn annotate(&self, item: &WorkItem) -> Result<AnnotationOutput, AnnotationError> {
        let RequestPayload::Reference(ref url) = item.payload else {
            return Err(AnnotationError::MissingInput(
                "caption requests need an image reference".to_string(),
            ));
        };

        debug!("Captioning row {} via {}", item.index, url);
        let beam_size = self.caption.beam_size.to_string();
        let max_len = self.caption.max_caption_length.to_string();
        let response = self
            .client
            .get(&self.caption.endpoint)
            .query(&[
                ("url", url.as_str()),
                ("beam_size", beam_size.as_str()),
                ("max_caption_length", max_len.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnnotationError::Transient(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnnotationError::Transient(format!(
                "caption service returned HTTP {} for {}",
                status, url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnnotationError::Transient(format!("reading body: {}", e)))?;
        let parsed: CaptionResponse = serde_json::from_str(&body)
            .map_err(|e| AnnotationError::Unusable(format!("invalid caption JSON: {}", e)))?;

        let text = format_captions(&parsed.captions);
        Ok(AnnotationOutput::from_text(text))
    }
}
