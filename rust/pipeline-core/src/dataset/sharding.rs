// rust/pipeline-core/src/dataset/sharding.rs

use std::ops::Range;

use crate::context::WorkerContext;
use crate::error::Result;

use super::traits::Records;

/// How a source restricts itself to one worker's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardPlan {
    /// No partitioning: the worker sees everything.
    Identity,
    /// Keep record `i` iff `i % num_workers == worker_id`.
    Modulo { worker_id: usize, num_workers: usize },
    /// Keep the contiguous half-open range `start..end`.
    Span { start: usize, end: usize },
}

impl ShardPlan {
    /// Plan for a source whose length is unknown.
    pub fn modulo(ctx: Option<WorkerContext>) -> Self {
        match ctx {
            Some(ctx) if ctx.num_workers() > 1 => Self::Modulo {
                worker_id: ctx.worker_id(),
                num_workers: ctx.num_workers(),
            },
            _ => Self::Identity,
        }
    }

    /// Plan for a source of `len` records.
    pub fn span(len: usize, ctx: Option<WorkerContext>) -> Self {
        match ctx {
            Some(ctx) => {
                let range = span_bounds(len, ctx);
                Self::Span {
                    start: range.start,
                    end: range.end,
                }
            }
            None => Self::Identity,
        }
    }

    /// Record range this plan keeps out of `len` records.
    ///
    /// Only meaningful for `Identity` and `Span`; a modulo plan has no single
    /// range and reports the whole input.
    pub fn bounds(&self, len: usize) -> Range<usize> {
        match *self {
            Self::Span { start, end } => start.min(len)..end.min(len),
            Self::Identity | Self::Modulo { .. } => 0..len,
        }
    }

    /// Restricts a record stream to this plan.
    pub fn apply<'a, T: 'a>(self, records: Records<'a, T>) -> Records<'a, T> {
        match self {
            Self::Identity => records,
            Self::Modulo {
                worker_id,
                num_workers,
            } => Box::new(ModuloShard::new(records, worker_id, num_workers)),
            Self::Span { start, end } => Box::new(records.skip(start).take(end.saturating_sub(start))),
        }
    }
}

/// Contiguous, size-balanced span owned by `ctx` out of `len` records.
///
/// `span = ceil(len / n)`; worker `i` gets `span * i .. span * (i + 1)`
/// clamped to `len`, so trailing workers may get a short or empty range.
pub fn span_bounds(len: usize, ctx: WorkerContext) -> Range<usize> {
    let span = len.div_ceil(ctx.num_workers());
    let start = span.saturating_mul(ctx.worker_id()).min(len);
    let end = span.saturating_mul(ctx.worker_id() + 1).min(len);
    start..end
}

/// Modulo filter over a record stream.
///
/// Positions count every upstream item, errors included, so all workers agree
/// on numbering. Errors are forwarded whatever their position.
pub struct ModuloShard<'a, T> {
    records: Records<'a, T>,
    worker_id: usize,
    num_workers: usize,
    position: usize,
}

impl<'a, T> ModuloShard<'a, T> {
    pub fn new(records: Records<'a, T>, worker_id: usize, num_workers: usize) -> Self {
        Self {
            records,
            worker_id,
            num_workers: num_workers.max(1),
            position: 0,
        }
    }
}

impl<T> Iterator for ModuloShard<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.records.next()?;
            let position = self.position;
            self.position += 1;

            if item.is_err() || position % self.num_workers == self.worker_id {
                return Some(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn ctx(id: usize, n: usize) -> WorkerContext {
        WorkerContext::new(id, n).unwrap()
    }

    fn records(len: usize) -> Records<'static, usize> {
        Box::new((0..len).map(Ok))
    }

    #[test]
    fn test_span_bounds_even_split() {
        assert_eq!(span_bounds(12, ctx(0, 3)), 0..4);
        assert_eq!(span_bounds(12, ctx(1, 3)), 4..8);
        assert_eq!(span_bounds(12, ctx(2, 3)), 8..12);
    }

    #[test]
    fn test_span_bounds_clamps_last_worker() {
        // span = ceil(10 / 4) = 3
        assert_eq!(span_bounds(10, ctx(0, 4)), 0..3);
        assert_eq!(span_bounds(10, ctx(3, 4)), 9..10);

        // span = ceil(5 / 4) = 2, worker 3 starts past the end
        assert_eq!(span_bounds(5, ctx(2, 4)), 4..5);
        assert_eq!(span_bounds(5, ctx(3, 4)), 5..5);
    }

    #[test]
    fn test_span_bounds_empty_source() {
        for id in 0..3 {
            assert!(span_bounds(0, ctx(id, 3)).is_empty());
        }
    }

    #[test]
    fn test_span_bounds_coverage() {
        for len in 0..40 {
            for n in 1..9 {
                let mut covered = Vec::new();
                for id in 0..n {
                    covered.extend(span_bounds(len, ctx(id, n)));
                }
                assert_eq!(covered, (0..len).collect::<Vec<_>>(), "len={len} n={n}");
            }
        }
    }

    #[test]
    fn test_plan_selection() {
        assert_eq!(ShardPlan::modulo(None), ShardPlan::Identity);
        assert_eq!(ShardPlan::modulo(Some(ctx(0, 1))), ShardPlan::Identity);
        assert_eq!(
            ShardPlan::modulo(Some(ctx(1, 3))),
            ShardPlan::Modulo { worker_id: 1, num_workers: 3 }
        );
        assert_eq!(ShardPlan::span(7, None), ShardPlan::Identity);
        assert_eq!(ShardPlan::span(7, Some(ctx(1, 2))), ShardPlan::Span { start: 4, end: 7 });
        assert_eq!(ShardPlan::span(7, Some(ctx(1, 2))).bounds(7), 4..7);
        assert_eq!(ShardPlan::Identity.bounds(7), 0..7);
    }

    #[test]
    fn test_modulo_uneven_split() {
        // 10 records over 4 workers: workers 0 and 1 get one extra
        let shards: Vec<Vec<usize>> = (0..4)
            .map(|id| {
                ShardPlan::modulo(Some(ctx(id, 4)))
                    .apply(records(10))
                    .collect::<Result<_>>()
                    .unwrap()
            })
            .collect();

        assert_eq!(shards[0], vec![0, 4, 8]);
        assert_eq!(shards[1], vec![1, 5, 9]);
        assert_eq!(shards[2], vec![2, 6]);
        assert_eq!(shards[3], vec![3, 7]);
    }

    #[test]
    fn test_modulo_more_workers_than_records() {
        let shard: Vec<usize> = ShardPlan::modulo(Some(ctx(5, 8)))
            .apply(records(3))
            .collect::<Result<_>>()
            .unwrap();
        assert!(shard.is_empty());
    }

    #[test]
    fn test_modulo_forwards_errors_at_any_position() {
        let input: Records<'static, usize> = Box::new(
            vec![Ok(0), Err(PipelineError::invalid_argument("bad")), Ok(2), Ok(3)].into_iter(),
        );
        let out: Vec<_> = ShardPlan::modulo(Some(ctx(0, 2))).apply(input).collect();

        // position 1 belongs to worker 1 but the error still reaches worker 0
        assert_eq!(out.len(), 3);
        assert!(matches!(out[0], Ok(0)));
        assert!(out[1].is_err());
        assert!(matches!(out[2], Ok(2)));
    }

    #[test]
    fn test_span_plan_on_stream() {
        let shard: Vec<usize> = ShardPlan::Span { start: 2, end: 5 }
            .apply(records(10))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(shard, vec![2, 3, 4]);
    }
}
