//! Configuration management for rowfill using the prefer crate.
//!
//! Every endpoint, path and tuning knob lives here and is passed explicitly
//! to annotators and the enrichment driver.
//!
//! Env vars: ROWFILL_CAPTION_ENDPOINT, ROWFILL_IMAGE_BASE_URL,
//! ROWFILL_OCR_ENDPOINT, ROWFILL_SYNTH_ENDPOINT, ROWFILL_IMAGE_DIR,
//! ROWFILL_BATCH_SIZE

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default checkpoint cadence (rows between saves).
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Where the dataset lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Table to load.
    pub input: String,
    /// Table to checkpoint into (defaults to `input`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            input: "Data/haunted_places_v2.tsv".to_string(),
            output: None,
        }
    }
}

/// Image storage shared by several annotators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Directory holding generated images.
    pub dir: String,
    /// Base URL under which `dir` is served to remote services.
    pub base_url: String,
    /// File name prefix; files are `<prefix><row index>.png`.
    pub prefix: String,
    /// Column holding each row's relative image path.
    pub path_column: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            dir: "Data/images".to_string(),
            base_url: "http://172.17.0.1:8000/images".to_string(),
            prefix: "haunted_image_".to_string(),
            path_column: "ai_image_path".to_string(),
        }
    }
}

/// Caption service parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub endpoint: String,
    pub beam_size: u32,
    pub max_caption_length: u32,
    /// Derived column written by the caption annotator.
    pub column: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8764/inception/v3/caption/image".to_string(),
            beam_size: 5,
            max_caption_length: 20,
            column: "detected_objects".to_string(),
        }
    }
}

/// OCR/document service parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub endpoint: String,
    /// OCR language sent to the service (e.g. "eng").
    pub language: String,
    /// Declared content type of uploaded files.
    pub content_type: String,
    /// Derived column written by the OCR annotator.
    pub column: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9998/tika".to_string(),
            language: "eng".to_string(),
            content_type: "image/png".to_string(),
            column: "image_caption".to_string(),
        }
    }
}

/// Image generator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Generator endpoint; synthesis is unavailable when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            width: 384,
            height: 384,
            steps: 30,
            guidance_scale: 7.0,
        }
    }
}

/// Retry policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Wait after a response that arrived but was unusable.
    pub unusable_delay_ms: u64,
    /// Wait after a transport failure or error status.
    pub transient_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unusable_delay_ms: 2_000,
            transient_delay_ms: 5_000,
        }
    }
}

/// Driver knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Rows processed between checkpoints.
    pub batch_size: usize,
    /// Rows in flight at once (1 = sequential).
    pub concurrency: usize,
    /// Per-call network timeout.
    pub timeout_secs: u64,
    /// Written instead of "" when a row exhausts its retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_marker: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            failure_marker: None,
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Full configuration as read from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub images: ImageConfig,
    pub caption: CaptionConfig,
    pub ocr: OcrConfig,
    pub synthesis: SynthesisConfig,
    pub retry: RetryConfig,
    pub run: RunConfig,
    /// File this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers rowfill config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("rowfill").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file: {}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            _ => serde_json::from_str(contents).map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Apply ROWFILL_* environment variables on top of the current values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("ROWFILL_CAPTION_ENDPOINT") {
            self.caption.endpoint = v;
        }
        if let Ok(v) = std::env::var("ROWFILL_IMAGE_BASE_URL") {
            self.images.base_url = v;
        }
        if let Ok(v) = std::env::var("ROWFILL_OCR_ENDPOINT") {
            self.ocr.endpoint = v;
        }
        if let Ok(v) = std::env::var("ROWFILL_SYNTH_ENDPOINT") {
            self.synthesis.endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("ROWFILL_IMAGE_DIR") {
            self.images.dir = v;
        }
        if let Some(n) = std::env::var("ROWFILL_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            self.run.batch_size = n;
        }
        self
    }

    /// Directory relative paths resolve against: the config file's
    /// directory if there is one, otherwise the working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.resolve_path(&self.images.dir)
    }

    pub fn input_path(&self) -> PathBuf {
        self.resolve_path(&self.dataset.input)
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.dataset.output {
            Some(output) => self.resolve_path(output),
            None => self.input_path(),
        }
    }

    /// Check values that would otherwise fail in the middle of a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("caption.endpoint", &self.caption.endpoint)?;
        check_url("images.base_url", &self.images.base_url)?;
        check_url("ocr.endpoint", &self.ocr.endpoint)?;
        if let Some(ref endpoint) = self.synthesis.endpoint {
            check_url("synthesis.endpoint", endpoint)?;
        }
        check_positive("run.batch_size", self.run.batch_size as u64)?;
        check_positive("run.concurrency", self.run.concurrency as u64)?;
        check_positive("run.timeout_secs", self.run.timeout_secs)?;
        check_positive("retry.max_attempts", self.retry.max_attempts as u64)?;
        check_positive("caption.beam_size", self.caption.beam_size as u64)?;
        check_positive(
            "caption.max_caption_length",
            self.caption.max_caption_length as u64,
        )?;
        Ok(())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            field,
            message: format!("{} ({})", value, e),
        })
}

fn check_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            message: "must be at least 1".to_string(),
        });
    }
    Ok(())
}
