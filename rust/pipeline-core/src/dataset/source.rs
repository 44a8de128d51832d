// rust/pipeline-core/src/dataset/source.rs

//! Source adapters.
//!
//! The adapter type fixes the sharding strategy: a [`StreamDataset`] shards a
//! [`StreamingSource`] by position modulo the worker count, a
//! [`SliceDataset`] reads one contiguous span of an [`IndexableSource`], and a
//! [`RangeDataset`] steps its arithmetic progression directly.

use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::context::WorkerContext;
use crate::error::{PipelineError, Result};

use super::sharding::ShardPlan;
use super::traits::{Dataset, IndexableSource, Records, StreamingSource};

/// Dataset over a sequential-only source, sharded by modulo.
#[derive(Debug, Clone)]
pub struct StreamDataset<S> {
    source: S,
}

impl<S> StreamDataset<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: StreamingSource> Dataset for StreamDataset<S> {
    type Item = S::Item;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, S::Item>> {
        let plan = ShardPlan::modulo(ctx);
        debug!(source = std::any::type_name::<S>(), ?plan, "starting stream traversal");
        Ok(plan.apply(self.source.stream()?))
    }
}

/// Dataset over a length-known source, sharded by contiguous span.
#[derive(Debug, Clone)]
pub struct SliceDataset<S> {
    source: S,
}

impl<S> SliceDataset<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: IndexableSource> Dataset for SliceDataset<S> {
    type Item = S::Item;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, S::Item>> {
        let len = self.source.len();
        let plan = ShardPlan::span(len, ctx);
        let range = plan.bounds(len);
        debug!(source = std::any::type_name::<S>(), len, ?plan, "starting slice traversal");

        if range.is_empty() && len > 0 {
            warn!(?ctx, len, "worker span is empty");
        }
        self.source.slice(range.start, range.end)
    }
}

/// A re-iterable value (collection, range, ...) used as a streaming source.
///
/// Every traversal iterates a fresh clone.
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    iterable: I,
}

impl<I> StreamingSource for IterSource<I>
where
    I: IntoIterator + Clone,
{
    type Item = I::Item;

    fn stream(&self) -> Result<Records<'_, I::Item>> {
        Ok(Box::new(self.iterable.clone().into_iter().map(Ok)))
    }
}

/// A factory closure used as a streaming source; handy for infinite or
/// generated sequences.
pub struct FnSource<F, I> {
    factory: F,
    _output: PhantomData<fn() -> I>,
}

impl<F, I> StreamingSource for FnSource<F, I>
where
    F: Fn() -> I,
    I: IntoIterator,
{
    type Item = I::Item;

    fn stream(&self) -> Result<Records<'_, I::Item>> {
        Ok(Box::new((self.factory)().into_iter().map(Ok)))
    }
}

/// Wraps a re-iterable value; sharded by modulo.
pub fn from_iter<I>(iterable: I) -> StreamDataset<IterSource<I>>
where
    I: IntoIterator + Clone,
{
    StreamDataset::new(IterSource { iterable })
}

/// Wraps an iterator factory; sharded by modulo.
pub fn from_fn<F, I>(factory: F) -> StreamDataset<FnSource<F, I>>
where
    F: Fn() -> I,
    I: IntoIterator,
{
    StreamDataset::new(FnSource {
        factory,
        _output: PhantomData,
    })
}

/// Wraps an in-memory random-access sequence; sharded by contiguous span.
pub fn from_vec<T: Clone>(records: Vec<T>) -> SliceDataset<Vec<T>> {
    SliceDataset::new(records)
}

/// Arithmetic progression `start, start + step, ...` bounded by `stop`
/// (exclusive), with the usual semantics for negative steps.
///
/// Under a worker context `(id, n)` the progression is re-stepped to
/// `start + step * id, start + step * (id + n), ...`, so no value is
/// generated only to be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeDataset {
    start: i64,
    stop: i64,
    step: i64,
}

impl RangeDataset {
    /// # Errors
    ///
    /// Returns an error if `step` is zero.
    pub fn new(start: i64, stop: i64, step: i64) -> Result<Self> {
        if step == 0 {
            return Err(PipelineError::invalid_argument("range step must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    /// `0..stop` with step 1.
    pub fn until(stop: i64) -> Self {
        Self {
            start: 0,
            stop,
            step: 1,
        }
    }

    /// Builds a range from `[stop]`, `[start, stop]` or `[start, stop, step]`.
    ///
    /// # Errors
    ///
    /// Returns an error for any other argument count or a zero step.
    pub fn from_args(args: &[i64]) -> Result<Self> {
        match *args {
            [stop] => Ok(Self::until(stop)),
            [start, stop] => Self::new(start, stop, 1),
            [start, stop, step] => Self::new(start, stop, step),
            _ => Err(PipelineError::invalid_argument(format!(
                "range expects 1 to 3 arguments, got {}",
                args.len()
            ))),
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn stop(&self) -> i64 {
        self.stop
    }

    pub fn step(&self) -> i64 {
        self.step
    }
}

impl Dataset for RangeDataset {
    type Item = i64;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, i64>> {
        // i128 keeps `step * id` and `step * n` exact for any i64 step and
        // usize worker count
        let (first, stride) = match ctx {
            Some(ctx) => (
                i128::from(self.start) + i128::from(self.step) * ctx.worker_id() as i128,
                i128::from(self.step) * ctx.num_workers() as i128,
            ),
            None => (i128::from(self.start), i128::from(self.step)),
        };
        debug!(?ctx, ?first, ?stride, stop = self.stop, "starting range traversal");

        let stop = i128::from(self.stop);
        let ascending = self.step > 0;
        let mut next = Some(first);
        Ok(Box::new(std::iter::from_fn(move || {
            let value = next?;
            let in_bounds = if ascending { value < stop } else { value > stop };
            // in-bounds values lie between start and stop, so they fit in i64
            match i64::try_from(value) {
                Ok(value) if in_bounds => {
                    next = next.and_then(|v| v.checked_add(stride));
                    Some(Ok(value))
                }
                _ => {
                    next = None;
                    None
                }
            }
        })))
    }
}

/// Builds a [`RangeDataset`] from 1 to 3 arguments, like a numeric range.
pub fn range(args: &[i64]) -> Result<RangeDataset> {
    RangeDataset::from_args(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: usize, n: usize) -> Option<WorkerContext> {
        Some(WorkerContext::new(id, n).unwrap())
    }

    #[test]
    fn test_range_sharding_exact() {
        let ds = range(&[0, 10, 1]).unwrap();
        assert_eq!(ds.all_for(ctx(0, 3)).unwrap(), vec![0, 3, 6, 9]);
        assert_eq!(ds.all_for(ctx(1, 3)).unwrap(), vec![1, 4, 7]);
        assert_eq!(ds.all_for(ctx(2, 3)).unwrap(), vec![2, 5, 8]);
    }

    #[test]
    fn test_range_argument_forms() {
        assert_eq!(range(&[4]).unwrap().all().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(range(&[2, 5]).unwrap().all().unwrap(), vec![2, 3, 4]);
        assert_eq!(range(&[0, 10, 3]).unwrap().all().unwrap(), vec![0, 3, 6, 9]);
        assert_eq!(range(&[5, 0, -2]).unwrap().all().unwrap(), vec![5, 3, 1]);
        assert!(range(&[3, 0]).unwrap().all().unwrap().is_empty());
    }

    #[test]
    fn test_range_invalid_arguments() {
        assert!(range(&[]).is_err());
        assert!(range(&[1, 2, 3, 4]).is_err());
        assert!(matches!(
            range(&[0, 10, 0]),
            Err(PipelineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_range_sharding_with_step_and_negative() {
        let ds = range(&[10, -10, -3]).unwrap();
        let full = ds.all().unwrap();
        assert_eq!(full, vec![10, 7, 4, 1, -2, -5, -8]);

        let mut merged = Vec::new();
        for id in 0..2 {
            merged.extend(ds.all_for(ctx(id, 2)).unwrap());
        }
        merged.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(merged, full);
    }

    #[test]
    fn test_range_stops_on_overflow() {
        let out = RangeDataset::new(i64::MAX - 2, i64::MAX, 5).unwrap().all().unwrap();
        assert_eq!(out, vec![i64::MAX - 2]);
    }

    #[test]
    fn test_range_sharding_at_i64_extremes() {
        let step = 1i64 << 62;
        let ds = RangeDataset::new(i64::MIN, i64::MAX, step).unwrap();
        assert_eq!(ds.all().unwrap(), vec![i64::MIN, -step, 0, step]);

        // the per-worker stride 2^63 does not fit in i64
        assert_eq!(ds.all_for(ctx(0, 2)).unwrap(), vec![i64::MIN, 0]);
        assert_eq!(ds.all_for(ctx(1, 2)).unwrap(), vec![-step, step]);

        let down = RangeDataset::new(i64::MAX, i64::MIN, -step).unwrap();
        let mut merged = Vec::new();
        for id in 0..3 {
            merged.extend(down.all_for(ctx(id, 3)).unwrap());
        }
        merged.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(merged, down.all().unwrap());
    }

    #[test]
    fn test_adapters_are_debug_and_clone() {
        let ds = from_vec(vec![1, 2, 3]);
        let copy = ds.clone();
        assert_eq!(copy.all().unwrap(), ds.all().unwrap());
        assert!(format!("{ds:?}").contains("SliceDataset"));

        let stream = from_iter(vec!['x']);
        assert!(format!("{:?}", stream.clone()).contains("StreamDataset"));
    }

    #[test]
    fn test_from_iter_uses_modulo() {
        let ds = from_iter(vec!['a', 'b', 'c', 'd', 'e']);
        assert_eq!(ds.all_for(ctx(0, 2)).unwrap(), vec!['a', 'c', 'e']);
        assert_eq!(ds.all_for(ctx(1, 2)).unwrap(), vec!['b', 'd']);
    }

    #[test]
    fn test_from_vec_uses_span() {
        let ds = from_vec(vec!['a', 'b', 'c', 'd', 'e']);
        assert_eq!(ds.all_for(ctx(0, 2)).unwrap(), vec!['a', 'b', 'c']);
        assert_eq!(ds.all_for(ctx(1, 2)).unwrap(), vec!['d', 'e']);
        assert_eq!(ds.all().unwrap(), vec!['a', 'b', 'c', 'd', 'e']);
    }

    #[test]
    fn test_span_last_worker_may_be_empty() {
        // span = ceil(5 / 4) = 2: [0,1] [2,3] [4] []
        let ds = from_vec((0..5).collect::<Vec<i32>>());
        assert_eq!(ds.all_for(ctx(2, 4)).unwrap(), vec![4]);
        assert!(ds.all_for(ctx(3, 4)).unwrap().is_empty());
    }

    #[test]
    fn test_from_fn_infinite_stream_sharded() {
        let ds = from_fn(|| 0u64..);
        assert_eq!(ds.iter_with(ctx(2, 4)).unwrap().take(3).collect::<Result<Vec<_>>>().unwrap(), vec![2, 6, 10]);
    }

    #[test]
    fn test_identical_construction_is_deterministic() {
        let build = || from_iter(0..100).filter(|x| x % 7 != 0).map(|x| x * 3);
        for id in 0..4 {
            assert_eq!(build().all_for(ctx(id, 4)).unwrap(), build().all_for(ctx(id, 4)).unwrap());
        }
    }

    #[test]
    fn test_single_worker_context_is_identity() {
        let ds = from_iter(0..5);
        assert_eq!(ds.all_for(ctx(0, 1)).unwrap(), ds.all().unwrap());
        let ds = from_vec(vec![1, 2, 3]);
        assert_eq!(ds.all_for(ctx(0, 1)).unwrap(), vec![1, 2, 3]);
    }
}
