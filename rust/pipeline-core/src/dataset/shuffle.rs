// rust/pipeline-core/src/dataset/shuffle.rs

//! Local and global shuffling.
//!
//! Without a buffer size the whole upstream is drained and permuted. With a
//! buffer size `B`, every `B` consecutive upstream records form one unit that
//! is permuted and emitted before more records are pulled. Unit boundaries are
//! deterministic; only the order inside a unit is random. A bounded shuffle
//! is a memory/quality trade-off, not an approximation of a full shuffle.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::context::WorkerContext;
use crate::error::{PipelineError, Result};

use super::traits::{Dataset, Records};

/// Node produced by [`Dataset::shuffle`].
pub struct Shuffle<D> {
    dataset: D,
    buffer_size: Option<usize>,
    seed: Option<u64>,
}

impl<D> Shuffle<D> {
    pub(crate) fn new(dataset: D, buffer_size: Option<usize>) -> Result<Self> {
        if buffer_size == Some(0) {
            return Err(PipelineError::invalid_argument(
                "shuffle buffer size must be greater than 0",
            ));
        }
        Ok(Self {
            dataset,
            buffer_size,
            seed: None,
        })
    }

    /// Draws permutations from a generator seeded with `seed`.
    ///
    /// The generator is re-seeded at the start of every traversal, so two
    /// pipelines built the same way produce the same order.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }
}

impl<D: Dataset> Dataset for Shuffle<D> {
    type Item = D::Item;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, D::Item>> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Ok(Box::new(ShuffleIter {
            records: self.dataset.iter_with(ctx)?,
            buffer_size: self.buffer_size,
            pending: Vec::new(),
            ready: Vec::new().into_iter(),
            rng,
            exhausted: false,
        }))
    }
}

struct ShuffleIter<'a, T> {
    records: Records<'a, T>,
    buffer_size: Option<usize>,
    pending: Vec<T>,
    ready: std::vec::IntoIter<T>,
    rng: StdRng,
    exhausted: bool,
}

impl<T> ShuffleIter<'_, T> {
    fn release(&mut self) {
        let mut unit = std::mem::take(&mut self.pending);
        unit.shuffle(&mut self.rng);
        self.ready = unit.into_iter();
    }
}

impl<T> Iterator for ShuffleIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.next() {
                return Some(Ok(item));
            }
            if self.exhausted {
                return None;
            }

            match self.records.next() {
                Some(Ok(item)) => {
                    self.pending.push(item);
                    if self.buffer_size.is_some_and(|size| self.pending.len() >= size) {
                        self.release();
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.exhausted = true;
                    self.release();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::source::{from_fn, from_iter};

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_zero_buffer_rejected() {
        assert!(matches!(
            from_iter(0..3).shuffle(Some(0)),
            Err(PipelineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_unbounded_keeps_multiset() {
        let input: Vec<u32> = (0..100).collect();
        let out = from_iter(input.clone()).shuffle(None).unwrap().all().unwrap();
        assert_eq!(out.len(), input.len());
        assert_eq!(sorted(out), input);
    }

    #[test]
    fn test_bounded_keeps_chunk_boundaries() {
        let out = from_iter(0u32..10).shuffle(Some(4)).unwrap().all().unwrap();
        assert_eq!(out.len(), 10);

        // units are [0..4), [4..8), [8..10) in pull order
        assert_eq!(sorted(out[0..4].to_vec()), vec![0, 1, 2, 3]);
        assert_eq!(sorted(out[4..8].to_vec()), vec![4, 5, 6, 7]);
        assert_eq!(sorted(out[8..10].to_vec()), vec![8, 9]);
    }

    #[test]
    fn test_bounded_streams_infinite_input() {
        let out = from_fn(|| 0u32..).shuffle(Some(8)).unwrap().take(8).unwrap();
        assert_eq!(sorted(out), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_buffer_of_one_keeps_order() {
        let out = from_iter(0u32..6).shuffle(Some(1)).unwrap().all().unwrap();
        assert_eq!(out, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_input() {
        let out = from_iter(Vec::<u32>::new()).shuffle(None).unwrap().all().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let build = || from_iter(0u32..50).shuffle(Some(16)).unwrap().with_seed(7);

        let first = build().all().unwrap();
        let second = build().all().unwrap();
        assert_eq!(first, second);

        // re-iterating the same node re-seeds as well
        let node = build();
        assert_eq!(node.all().unwrap(), node.all().unwrap());
    }

    #[test]
    fn test_shuffle_after_sharding_stays_in_shard() {
        let ctx = WorkerContext::new(1, 3).ok();
        let out = from_iter(0u32..30).shuffle(None).unwrap().all_for(ctx).unwrap();
        assert_eq!(sorted(out), (0..30).filter(|x| x % 3 == 1).collect::<Vec<_>>());
    }
}
