//! Image synthesis annotator: generates one image per row from its text fields.
//!
//! The generator itself is an opaque collaborator behind [`ImageSynthesizer`];
//! [`HttpSynthesizer`] talks to a generation server over HTTP.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::{ImageConfig, SynthesisConfig};
use crate::models::Record;

use super::annotator::Annotator;
use super::image_path::{image_filename, relative_image_path};
use super::types::{AnnotationError, AnnotationOutput, RequestPayload, WorkItem};

/// Build the generation prompt from a record's descriptive fields.
/// Missing fields render as empty text.
pub fn build_prompt(record: &Record<'_>) -> String {
    format!(
        "Haunted scene in {}, {}. {} Apparition: {}.",
        record.text("city"),
        record.text("state"),
        record.text("description"),
        record.text("apparition type")
    )
}

/// Something that turns a prompt into image bytes.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Human-readable description for availability output.
    fn describe(&self) -> String;

    async fn is_available(&self) -> bool;

    /// Generate an image for row `index`; returns encoded image bytes.
    async fn synthesize(&self, prompt: &str, index: usize) -> Result<Vec<u8>, AnnotationError>;
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    prompt: &'a str,
    index: usize,
    width: u32,
    height: u32,
    steps: u32,
    guidance_scale: f32,
}

/// Generator reached over HTTP: POST JSON, receive image bytes.
pub struct HttpSynthesizer {
    client: Client,
    endpoint: String,
    config: SynthesisConfig,
}

impl HttpSynthesizer {
    pub fn new(
        endpoint: String,
        config: SynthesisConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }
}

#[async_trait]
impl ImageSynthesizer for HttpSynthesizer {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    async fn is_available(&self) -> bool {
        self.client.get(&self.endpoint).send().await.is_ok()
    }

    async fn synthesize(&self, prompt: &str, index: usize) -> Result<Vec<u8>, AnnotationError> {
        let request = SynthesisRequest {
            prompt,
            index,
            width: self.config.width,
            height: self.config.height,
            steps: self.config.steps,
            guidance_scale: self.config.guidance_scale,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnnotationError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnnotationError::Transient(format!(
                "generator returned HTTP {}",
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AnnotationError::Transient(format!("reading body: {}", e)))?;
        if bytes.is_empty() {
            return Err(AnnotationError::Unusable(
                "generator returned an empty image".to_string(),
            ));
        }
        Ok(bytes.to_vec())
    }
}

/// Generates and stores an image per row, recording its relative path.
pub struct SynthesisAnnotator {
    synthesizer: Box<dyn ImageSynthesizer>,
    image_dir: PathBuf,
    prefix: String,
    column: String,
}

impl SynthesisAnnotator {
    pub fn new(
        synthesizer: Box<dyn ImageSynthesizer>,
        images: &ImageConfig,
        image_dir: PathBuf,
    ) -> Self {
        Self {
            synthesizer,
            image_dir,
            prefix: images.prefix.clone(),
            column: images.path_column.clone(),
        }
    }
}

#[async_trait]
impl Annotator for SynthesisAnnotator {
    fn name(&self) -> &str {
        "synthesize"
    }

    fn default_column(&self) -> &str {
        &self.column
    }

    async fn is_available(&self) -> bool {
        self.synthesizer.is_available().await
    }

    fn availability_hint(&self) -> String {
        format!(
            "image generator not reachable at {}",
            self.synthesizer.describe()
        )
    }

    fn prepare(&self, record: &Record<'_>) -> Result<WorkItem, AnnotationError> {
        Ok(WorkItem::new(
            record.index(),
            RequestPayload::Prompt(build_prompt(record)),
        ))
    }

    async fn annotate(&self, item: &WorkItem) -> Result<AnnotationOutput, AnnotationError> {
        let RequestPayload::Prompt(ref prompt) = item.payload else {
            return Err(AnnotationError::MissingInput(
                "synthesis requests need a prompt".to_string(),
            ));
        };

        debug!(
            "Record {} prompt: {}...",
            item.index,
            prompt.chars().take(80).collect::<String>()
        );
        let bytes = self.synthesizer.synthesize(prompt, item.index).await?;

        let dir = &self.image_dir;
        let filename = image_filename(&self.prefix, item.index);
        let path = write_image(dir, &filename, &bytes)
            .map_err(|e| AnnotationError::Transient(format!("{}: {}", dir.display(), e)))?;
        info!(
            "Saved image for record {} to {}",
            item.index,
            path.display()
        );

        let relative = relative_image_path(dir, &self.prefix, item.index);
        Ok(AnnotationOutput::Data(relative))
    }
}

/// Write an image next to its final path and rename it into place, so an
/// interrupted write never leaves a truncated file under the final name.
fn write_image(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dataset;

    struct FixedSynthesizer;

    #[async_trait]
    impl ImageSynthesizer for FixedSynthesizer {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn synthesize(
            &self,
            _prompt: &str,
            _index: usize,
        ) -> Result<Vec<u8>, AnnotationError> {
            Ok(b"\x89PNG".to_vec())
        }
    }

    #[test]
    fn test_build_prompt() {
        let ds = Dataset::from_parts(
            vec![
                "city".to_string(),
                "state".to_string(),
                "description".to_string(),
                "apparition type".to_string(),
            ],
            vec![vec![
                Some("Ada".to_string()),
                Some("Michigan".to_string()),
                Some("Doors slam at night.".to_string()),
                Some("Shadow".to_string()),
            ]],
        )
        .unwrap();
        assert_eq!(
            build_prompt(&ds.record(0).unwrap()),
            "Haunted scene in Ada, Michigan. Doors slam at night. Apparition: Shadow."
        );
    }

    #[test]
    fn test_build_prompt_missing_fields() {
        let ds = Dataset::from_parts(
            vec!["city".to_string()],
            vec![vec![Some("Ada".to_string())]],
        )
        .unwrap();
        assert_eq!(
            build_prompt(&ds.record(0).unwrap()),
            "Haunted scene in Ada, .  Apparition: ."
        );
    }

    fn annotator(image_dir: PathBuf) -> SynthesisAnnotator {
        SynthesisAnnotator::new(
            Box::new(FixedSynthesizer),
            &ImageConfig::default(),
            image_dir,
        )
    }

    #[tokio::test]
    async fn test_writes_image_and_returns_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        let annotator = annotator(image_dir.clone());

        let output = annotator
            .annotate(&WorkItem::new(12, RequestPayload::Prompt("x".to_string())))
            .await
            .unwrap();
        assert_eq!(
            output,
            AnnotationOutput::Data("images/haunted_image_12.png".to_string())
        );
        assert_eq!(
            std::fs::read(image_dir.join("haunted_image_12.png")).unwrap(),
            b"\x89PNG"
        );

        // Only the finished image is left behind.
        let entries: Vec<_> = std::fs::read_dir(&image_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(
            entries,
            vec![std::ffi::OsString::from("haunted_image_12.png")]
        );
    }

    #[tokio::test]
    async fn test_unwritable_image_dir_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        std::fs::write(&image_dir, b"not a directory").unwrap();
        let annotator = annotator(image_dir.clone());

        let result = annotator
            .annotate(&WorkItem::new(3, RequestPayload::Prompt("x".to_string())))
            .await;
        assert!(matches!(result, Err(AnnotationError::Transient(_))));
        assert!(!image_dir.join("haunted_image_3.png").exists());
    }

    #[test]
    fn test_write_image_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"old and longer").unwrap();

        let path = write_image(dir.path(), "a.png", b"new").unwrap();
        assert_eq!(path, dir.path().join("a.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
