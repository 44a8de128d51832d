// rust/pipeline-core/src/dataset/traits.rs

use crate::context::WorkerContext;
use crate::error::{PipelineError, Result};

use super::combinators::{Apply, Concat, Filter, FlatMap, Map, Zip, ZipAll};
use super::shuffle::Shuffle;
use super::window::Window;

/// A single traversal of a dataset: a pull-based stream of records.
///
/// Read and decode failures travel through the stream as `Err` items at the
/// position of the offending record.
pub type Records<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// A type-erased dataset node.
pub type BoxedDataset<'a, T> = Box<dyn Dataset<Item = T> + 'a>;

/// A lazy, re-iterable sequence of records.
///
/// Nodes are immutable once built. Every call to [`iter_with`](Dataset::iter_with)
/// starts an independent traversal whose state (buffers, open files, RNG) is
/// owned by the returned iterator and released when it is dropped.
pub trait Dataset {
    type Item;

    /// Starts a traversal of the shard owned by `ctx`.
    ///
    /// `None` yields the whole sequence. The context is handed down to every
    /// source in the pipeline, which picks its own sharding strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot start reading (e.g. the file
    /// disappeared after the node was built).
    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, Self::Item>>;

    /// Starts an unpartitioned traversal.
    fn iter(&self) -> Result<Records<'_, Self::Item>> {
        self.iter_with(None)
    }

    /// Collects the whole sequence. Does not return on infinite input.
    fn all(&self) -> Result<Vec<Self::Item>> {
        self.iter()?.collect()
    }

    /// Collects the shard owned by `ctx`.
    fn all_for(&self, ctx: Option<WorkerContext>) -> Result<Vec<Self::Item>> {
        self.iter_with(ctx)?.collect()
    }

    /// Returns the first record, or [`PipelineError::EmptySequence`].
    fn first(&self) -> Result<Self::Item> {
        self.first_for(None)
    }

    /// Returns the first record of the shard owned by `ctx`.
    fn first_for(&self, ctx: Option<WorkerContext>) -> Result<Self::Item> {
        self.iter_with(ctx)?
            .next()
            .unwrap_or(Err(PipelineError::EmptySequence))
    }

    /// Collects at most `n` records.
    fn take(&self, n: usize) -> Result<Vec<Self::Item>> {
        self.take_for(None, n)
    }

    /// Collects at most `n` records of the shard owned by `ctx`.
    fn take_for(&self, ctx: Option<WorkerContext>, n: usize) -> Result<Vec<Self::Item>> {
        self.iter_with(ctx)?.take(n).collect()
    }

    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Item) -> U,
    {
        Map::new(self, f)
    }

    fn flat_map<I, F>(self, f: F) -> FlatMap<Self, F, I>
    where
        Self: Sized,
        F: Fn(Self::Item) -> I,
        I: IntoIterator,
    {
        FlatMap::new(self, f)
    }

    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        Self: Sized,
        P: Fn(&Self::Item) -> bool,
    {
        Filter::new(self, predicate)
    }

    /// Hands the upstream record stream to `transform` for multi-record
    /// transforms the other combinators cannot express.
    fn apply<U, G>(self, transform: G) -> Apply<Self, G, U>
    where
        Self: Sized,
        G: for<'a> Fn(Records<'a, Self::Item>) -> Records<'a, U>,
    {
        Apply::new(self, transform)
    }

    /// Shuffles the whole sequence (`None`) or every `buffer_size`
    /// consecutive records.
    ///
    /// # Errors
    ///
    /// Returns an error if `buffer_size` is `Some(0)`.
    fn shuffle(self, buffer_size: Option<usize>) -> Result<Shuffle<Self>>
    where
        Self: Sized,
    {
        Shuffle::new(self, buffer_size)
    }

    /// Groups records into windows of `window_size`, each starting `shift`
    /// (default `window_size`) after the previous one. Incomplete trailing
    /// windows are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if `window_size` or `shift` is zero.
    fn window(self, window_size: usize, shift: Option<usize>) -> Result<Window<Self>>
    where
        Self: Sized,
        Self::Item: Clone,
    {
        Window::new(self, window_size, shift)
    }

    /// Appends `others`, in order, after this dataset.
    fn concat<D, I>(self, others: I) -> Concat<Self, D>
    where
        Self: Sized,
        D: Dataset<Item = Self::Item>,
        I: IntoIterator<Item = D>,
    {
        Concat::new(self, others.into_iter().collect())
    }

    /// Pairs records with `other`, stopping at the shorter side.
    fn zip<D>(self, other: D) -> Zip<Self, D>
    where
        Self: Sized,
        D: Dataset,
    {
        Zip::new(self, other)
    }

    /// Yields one row per step across this dataset and `others`, stopping at
    /// the shortest input.
    fn zip_all<D, I>(self, others: I) -> ZipAll<Self, D>
    where
        Self: Sized,
        D: Dataset<Item = Self::Item>,
        I: IntoIterator<Item = D>,
    {
        ZipAll::new(self, others.into_iter().collect())
    }

    fn boxed<'a>(self) -> BoxedDataset<'a, Self::Item>
    where
        Self: Sized + 'a,
    {
        Box::new(self)
    }
}

impl<D: Dataset + ?Sized> Dataset for Box<D> {
    type Item = D::Item;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, Self::Item>> {
        (**self).iter_with(ctx)
    }
}

/// A source that can only be read front to back.
///
/// Wrapped in a [`StreamDataset`](super::StreamDataset), it is sharded by
/// record position modulo the worker count.
pub trait StreamingSource {
    type Item;

    /// Opens a fresh pass over the source.
    fn stream(&self) -> Result<Records<'_, Self::Item>>;
}

/// A source with a known length and contiguous range reads.
///
/// Wrapped in a [`SliceDataset`](super::SliceDataset), each worker reads only
/// its own contiguous span.
pub trait IndexableSource {
    type Item;

    /// Number of records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads records `start..end`. Callers keep `start <= end <= len()`.
    fn slice(&self, start: usize, end: usize) -> Result<Records<'_, Self::Item>>;
}

impl<T: Clone> IndexableSource for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn slice(&self, start: usize, end: usize) -> Result<Records<'_, T>> {
        let end = end.min(Vec::len(self));
        let start = start.min(end);
        Ok(Box::new(self[start..end].iter().cloned().map(Ok)))
    }
}
