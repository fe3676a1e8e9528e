//! Shared helper functions for CLI commands.

use std::path::{Path, PathBuf};

use anyhow::Context;

use rowfill::config::Config;
use rowfill::models::Dataset;
use rowfill::services::annotation::{
    Annotator, CaptionAnnotator, HttpSynthesizer, ImagePathAnnotator, OcrAnnotator,
    SynthesisAnnotator,
};
use rowfill::store::{TabularStore, TsvStore};

use super::commands::AnnotatorKind;

/// Load config from an explicit path, or discover it.
pub async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_path(path)
            .await
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().await,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Store for the dataset, honoring command-line overrides.
///
/// An explicit input without an explicit output writes back to that input.
pub fn open_store(config: &Config, input: Option<PathBuf>, output: Option<PathBuf>) -> TsvStore {
    let (input, output) = match (input, output) {
        (Some(input), Some(output)) => (input, output),
        (Some(input), None) => (input.clone(), input),
        (None, Some(output)) => (config.input_path(), output),
        (None, None) => (config.input_path(), config.output_path()),
    };
    TsvStore::new(input).with_output(output)
}

/// Load the dataset, failing early when there is nothing to load.
pub fn load_dataset(store: &dyn TabularStore) -> anyhow::Result<Dataset> {
    if !store.exists() {
        anyhow::bail!("Input table not found: {}", store.describe());
    }
    store
        .load()
        .with_context(|| format!("loading {}", store.describe()))
}

/// Construct the annotator for `kind` from configuration.
pub fn build_annotator(kind: AnnotatorKind, config: &Config) -> anyhow::Result<Box<dyn Annotator>> {
    let timeout = config.run.timeout();
    let annotator: Box<dyn Annotator> = match kind {
        AnnotatorKind::Caption => Box::new(
            CaptionAnnotator::new(config.caption.clone(), config.images.clone(), timeout)
                .context("building HTTP client")?,
        ),
        AnnotatorKind::Ocr => Box::new(
            OcrAnnotator::new(
                config.ocr.clone(),
                &config.images,
                config.image_dir(),
                timeout,
            )
            .context("building HTTP client")?,
        ),
        AnnotatorKind::ImagePath => {
            Box::new(ImagePathAnnotator::new(&config.images, config.image_dir()))
        }
        AnnotatorKind::Synthesize => {
            let endpoint = config.synthesis.endpoint.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "synthesis.endpoint is not configured (set it in the config file or ROWFILL_SYNTH_ENDPOINT)"
                )
            })?;
            let synthesizer = HttpSynthesizer::new(endpoint, config.synthesis.clone(), timeout)
                .context("building HTTP client")?;
            Box::new(SynthesisAnnotator::new(
                Box::new(synthesizer),
                &config.images,
                config.image_dir(),
            ))
        }
    };
    Ok(annotator)
}

/// Truncate a string to `max_len` characters, adding "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
