// rust/pipeline-core/src/lib.rs

//! Shard-aware data pipelines.
//!
//! This crate builds lazy record pipelines (map, filter, shuffle, window,
//! concat, zip, ...) over in-memory collections, generators, numeric ranges
//! and line-oriented text files. Given a worker context, a pipeline yields
//! only that worker's disjoint shard of the source.

pub mod config;
pub mod context;
pub mod dataset;
pub mod error;

// Re-export commonly used types for convenience
pub use config::{PipelineConfig, ShuffleConfig, TextConfig, WorkerConfig};
pub use context::WorkerContext;
pub use error::{PipelineError, Result};

pub use dataset::{
    from_fn, from_iter, from_vec, range, span_bounds, BoxedDataset, ConcatTextDataset, Dataset,
    IndexableSource, IndexedTextDataset, RangeDataset, Records, ShardPlan, StreamingSource,
    TextDataset, ZipTextDataset,
};
