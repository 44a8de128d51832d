// rust/pipeline-core/src/context.rs

//! Worker identity supplied by the host data-loading process.
//!
//! A pipeline never looks this up on its own. The host resolves the context
//! once (from its own bookkeeping, from a config file, or from the
//! environment via [`WorkerContext::from_env`]) and passes it to
//! [`Dataset::iter_with`](crate::Dataset::iter_with). `None` means the
//! pipeline runs unpartitioned.

use crate::error::{PipelineError, Result};

/// Environment variable holding the 0-based worker index.
pub const WORKER_ID_ENV: &str = "SDP_WORKER_ID";
/// Environment variable holding the total number of workers.
pub const NUM_WORKERS_ENV: &str = "SDP_NUM_WORKERS";

/// Identity of one worker among `num_workers` independent workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerContext {
    worker_id: usize,
    num_workers: usize,
}

impl WorkerContext {
    /// Creates a context, checking `num_workers >= 1` and
    /// `worker_id < num_workers`.
    pub fn new(worker_id: usize, num_workers: usize) -> Result<Self> {
        if num_workers == 0 || worker_id >= num_workers {
            return Err(PipelineError::invalid_worker(worker_id, num_workers));
        }
        Ok(Self {
            worker_id,
            num_workers,
        })
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Every context of an `num_workers`-way split, in worker order.
    pub fn all(num_workers: usize) -> Result<Vec<Self>> {
        (0..num_workers.max(1))
            .map(|id| Self::new(id, num_workers))
            .collect()
    }

    /// Resolves the context from `SDP_WORKER_ID` / `SDP_NUM_WORKERS`.
    ///
    /// Returns `Ok(None)` when neither variable is set.
    ///
    /// # Errors
    ///
    /// Returns an error if only one variable is set, if either value is not
    /// a non-negative integer, or if the pair violates the context invariant.
    pub fn from_env() -> Result<Option<Self>> {
        let worker_id = read_env(WORKER_ID_ENV)?;
        let num_workers = read_env(NUM_WORKERS_ENV)?;
        Self::from_parts(worker_id, num_workers)
    }

    /// Builds a context from optional halves, as found in config files.
    pub fn from_parts(worker_id: Option<usize>, num_workers: Option<usize>) -> Result<Option<Self>> {
        match (worker_id, num_workers) {
            (None, None) => Ok(None),
            (Some(id), Some(n)) => Self::new(id, n).map(Some),
            (Some(_), None) => Err(PipelineError::config(
                "worker id is set but the number of workers is not",
            )),
            (None, Some(_)) => Err(PipelineError::config(
                "number of workers is set but the worker id is not",
            )),
        }
    }
}

fn read_env(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PipelineError::config_with_source(format!("{key} must be an integer"), e)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(PipelineError::config_with_source(format!("{key} is not valid unicode"), e)),
    }
}
