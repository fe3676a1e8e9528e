//! Image path annotator: links rows to images already on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::config::ImageConfig;
use crate::models::Record;

use super::annotator::Annotator;
use super::types::{AnnotationError, AnnotationOutput, RequestPayload, WorkItem};

/// File name of the image belonging to a row.
pub fn image_filename(prefix: &str, index: usize) -> String {
    format!("{}{}.png", prefix, index)
}

/// Path stored in the dataset for a row's image, e.g. `images/haunted_image_4.png`:
/// the image directory's own name joined with the file name.
pub fn relative_image_path(image_dir: &Path, prefix: &str, index: usize) -> String {
    let dir = image_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("images");
    format!("{}/{}", dir, image_filename(prefix, index))
}

/// Records `<dir name>/<prefix><index>.png` for rows whose image exists.
pub struct ImagePathAnnotator {
    image_dir: PathBuf,
    prefix: String,
    column: String,
}

impl ImagePathAnnotator {
    pub fn new(images: &ImageConfig, image_dir: PathBuf) -> Self {
        Self {
            image_dir,
            prefix: images.prefix.clone(),
            column: images.path_column.clone(),
        }
    }

    pub fn relative_path(&self, index: usize) -> String {
        relative_image_path(&self.image_dir, &self.prefix, index)
    }
}

#[async_trait]
impl Annotator for ImagePathAnnotator {
    fn name(&self) -> &str {
        "image-path"
    }

    fn default_column(&self) -> &str {
        &self.column
    }

    async fn is_available(&self) -> bool {
        self.image_dir.is_dir()
    }

    fn availability_hint(&self) -> String {
        format!(
            "image directory {} does not exist",
            self.image_dir.display()
        )
    }

    fn prepare(&self, record: &Record<'_>) -> Result<WorkItem, AnnotationError> {
        Ok(WorkItem::new(record.index(), RequestPayload::Index))
    }

    async fn annotate(&self, item: &WorkItem) -> Result<AnnotationOutput, AnnotationError> {
        let expected = self
            .image_dir
            .join(image_filename(&self.prefix, item.index));
        match tokio::fs::try_exists(&expected).await {
            Ok(true) => Ok(AnnotationOutput::Data(self.relative_path(item.index))),
            Ok(false) => {
                warn!(
                    "Image file for index {} not found at {}",
                    item.index,
                    expected.display()
                );
                Ok(AnnotationOutput::NoResult)
            }
            Err(e) => Err(AnnotationError::Transient(format!(
                "{}: {}",
                expected.display(),
                e
            ))),
        }
    }
}
