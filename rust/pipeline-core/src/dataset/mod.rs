// rust/pipeline-core/src/dataset/mod.rs

//! Lazy, shard-aware dataset pipelines.
//!
//! A pipeline is a chain of [`Dataset`] nodes built from a source and
//! combinators. Building a chain performs no I/O; records are produced only
//! when a traversal starts with [`Dataset::iter_with`], and every traversal
//! is independent of the others.
//!
//! Passing a [`WorkerContext`](crate::WorkerContext) to a traversal makes
//! the source yield only that worker's shard. Combinators never repartition,
//! so `N` workers running the same chain with contexts `0..N` together see
//! every source record exactly once.
//!
//! # Example
//!
//! ```
//! use pipeline_core::{from_iter, Dataset, WorkerContext};
//!
//! let pipeline = from_iter(0..10)
//!     .filter(|x| x % 3 != 0)
//!     .map(|x| x * 10);
//!
//! // worker 1 of 2 owns positions 1, 3, 5, 7, 9 of the source
//! let ctx = WorkerContext::new(1, 2)?;
//! assert_eq!(pipeline.all_for(Some(ctx))?, vec![10, 50, 70]);
//! # Ok::<(), pipeline_core::PipelineError>(())
//! ```

mod combinators;
mod sharding;
mod shuffle;
mod source;
mod text;
mod traits;
mod window;

pub use combinators::{Apply, Concat, Filter, FlatMap, Map, Zip, ZipAll};
pub use sharding::{span_bounds, ModuloShard, ShardPlan};
pub use shuffle::Shuffle;
pub use source::{
    from_fn, from_iter, from_vec, range, FnSource, IterSource, RangeDataset, SliceDataset,
    StreamDataset,
};
pub use text::{
    ConcatTextDataset, ConcatTextLines, IndexedTextDataset, IndexedTextFile, TextDataset,
    TextLines, ZipTextDataset, ZipTextLines,
};
pub use traits::{BoxedDataset, Dataset, IndexableSource, Records, StreamingSource};
pub use window::Window;
