// rust/pipeline-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {

    #[error("Source error at '{path}': {message}")]
    Source {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid UTF-8 in '{path}' at line {line}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
    },

    #[error("Worker {worker_id} out of range (num workers: {num_workers})")]
    InvalidWorker {
        worker_id: usize,
        num_workers: usize,
    },

    #[error("Sequence is empty")]
    EmptySequence,

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// Convenience constructors
impl PipelineError {

    pub fn source(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Source {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn source_with_io(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Source {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn decode(path: impl Into<PathBuf>, line: usize, source: std::str::Utf8Error) -> Self {
        Self::Decode {
            path: path.into(),
            line,
            source,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_worker(worker_id: usize, num_workers: usize) -> Self {
        Self::InvalidWorker { worker_id, num_workers }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns `true` for the "no elements" condition raised by `first()`.
    pub fn is_empty_sequence(&self) -> bool {
        matches!(self, Self::EmptySequence)
    }
}
