// rust/pipeline-core/src/config.rs

//! Pipeline configuration.
//!
//! Settings are read from a TOML file, then environment variables prefixed
//! with `SDP_` override individual fields. Every section is optional; missing
//! fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::context::{WorkerContext, NUM_WORKERS_ENV, WORKER_ID_ENV};
use crate::error::{PipelineError, Result};

// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub worker: WorkerConfig,
    pub text: TextConfig,
    pub shuffle: ShuffleConfig,
}

/// Worker identity, when the host passes it through configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_workers: Option<usize>,
}

impl WorkerConfig {
    /// Resolves the configured pair into a context.
    ///
    /// # Errors
    ///
    /// Returns an error if only one half is set or the pair is out of range.
    pub fn context(&self) -> Result<Option<WorkerContext>> {
        WorkerContext::from_parts(self.worker_id, self.num_workers)
    }
}

// Text file reading options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    // Read buffer size in bytes.
    pub buffer_size: usize,
    // Whether indexed text files are scanned through a memory map.
    pub use_mmap: bool,
    // File size (bytes) at or above which the memory map is used.
    pub mmap_threshold: u64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

/// Defaults for shuffle stages built from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleConfig {
    /// Bounded shuffle unit; unset means a full shuffle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    /// Seed for reproducible permutations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl FromStr for PipelineConfig {
    type Err = PipelineError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| PipelineError::config_with_source("failed to parse TOML config", e))
    }
}

impl PipelineConfig {
    // Load and validate configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config_with_source(
                format!("failed to read config file '{}'", path.display()),
                e,
            )
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // - `SDP_WORKER_ID` / `SDP_NUM_WORKERS` override `worker.*`
    // - `SDP_TEXT_BUFFER_SIZE` overrides `text.buffer_size`
    // - `SDP_TEXT_USE_MMAP` overrides `text.use_mmap`
    // - `SDP_TEXT_MMAP_THRESHOLD` overrides `text.mmap_threshold`
    // - `SDP_SHUFFLE_BUFFER_SIZE` overrides `shuffle.buffer_size`
    // - `SDP_SHUFFLE_SEED` overrides `shuffle.seed`
    //
    // Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_value(WORKER_ID_ENV) {
            self.worker.worker_id = Some(v);
        }
        if let Some(v) = env_value(NUM_WORKERS_ENV) {
            self.worker.num_workers = Some(v);
        }

        if let Some(v) = env_value("SDP_TEXT_BUFFER_SIZE") {
            self.text.buffer_size = v;
        }
        if let Some(v) = env_value("SDP_TEXT_USE_MMAP") {
            self.text.use_mmap = v;
        }
        if let Some(v) = env_value("SDP_TEXT_MMAP_THRESHOLD") {
            self.text.mmap_threshold = v;
        }

        if let Some(v) = env_value("SDP_SHUFFLE_BUFFER_SIZE") {
            self.shuffle.buffer_size = Some(v);
        }
        if let Some(v) = env_value("SDP_SHUFFLE_SEED") {
            self.shuffle.seed = Some(v);
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        self.worker.context()?;

        if self.text.buffer_size == 0 {
            return Err(PipelineError::config(
                "text.buffer_size must be greater than 0",
            ));
        }

        if self.shuffle.buffer_size == Some(0) {
            return Err(PipelineError::config(
                "shuffle.buffer_size must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
