// rust/pipeline-core/src/dataset/window.rs

use std::collections::VecDeque;

use crate::context::WorkerContext;
use crate::error::{PipelineError, Result};

use super::traits::{Dataset, Records};

/// Node produced by [`Dataset::window`].
///
/// Windows start at upstream index 0 and every `shift` records after that.
/// A window that cannot be filled before the upstream ends is dropped, so
/// every emitted window has exactly `window_size` records.
pub struct Window<D> {
    dataset: D,
    size: usize,
    shift: usize,
}

impl<D> Window<D> {
    pub(crate) fn new(dataset: D, size: usize, shift: Option<usize>) -> Result<Self> {
        let shift = shift.unwrap_or(size);
        if size == 0 {
            return Err(PipelineError::invalid_argument(
                "window size must be greater than 0",
            ));
        }
        if shift == 0 {
            return Err(PipelineError::invalid_argument(
                "window shift must be greater than 0",
            ));
        }
        Ok(Self {
            dataset,
            size,
            shift,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn shift(&self) -> usize {
        self.shift
    }
}

impl<D> Dataset for Window<D>
where
    D: Dataset,
    D::Item: Clone,
{
    type Item = Vec<D::Item>;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, Self::Item>> {
        Ok(Box::new(WindowIter {
            records: self.dataset.iter_with(ctx)?,
            size: self.size,
            shift: self.shift,
            buffer: VecDeque::with_capacity(self.size),
            skip: 0,
        }))
    }
}

struct WindowIter<'a, T> {
    records: Records<'a, T>,
    size: usize,
    shift: usize,
    buffer: VecDeque<T>,
    // upstream records to discard before the next window starts (shift > size)
    skip: usize,
}

impl<T: Clone> Iterator for WindowIter<'_, T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.skip > 0 {
            if let Err(e) = self.records.next()? {
                return Some(Err(e));
            }
            self.skip -= 1;
        }

        while self.buffer.len() < self.size {
            match self.records.next()? {
                Ok(item) => self.buffer.push_back(item),
                Err(e) => return Some(Err(e)),
            }
        }

        let window: Vec<T> = self.buffer.iter().cloned().collect();
        if self.shift < self.size {
            self.buffer.drain(..self.shift);
        } else {
            self.buffer.clear();
            self.skip = self.shift - self.size;
        }
        Some(Ok(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::source::{from_fn, from_iter};

    #[test]
    fn test_overlapping_windows_drop_partial_tail() {
        let out = from_iter(vec![1, 2, 3, 4, 5]).window(3, Some(2)).unwrap().all().unwrap();
        assert_eq!(out, vec![vec![1, 2, 3], vec![3, 4, 5]]);
    }

    #[test]
    fn test_tiling_by_default() {
        let out = from_iter(0..7).window(3, None).unwrap().all().unwrap();
        // [6] is short and dropped
        assert_eq!(out, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_shift_larger_than_size_skips() {
        let out = from_iter(0..10).window(2, Some(4)).unwrap().all().unwrap();
        assert_eq!(out, vec![vec![0, 1], vec![4, 5], vec![8, 9]]);
    }

    #[test]
    fn test_sliding_by_one() {
        let out = from_iter(0..5).window(2, Some(1)).unwrap().all().unwrap();
        assert_eq!(out, vec![vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 4]]);
    }

    #[test]
    fn test_window_count_formula() {
        for len in 0usize..30 {
            for size in 1..6 {
                for shift in 1..6 {
                    let out = from_iter(0..len).window(size, Some(shift)).unwrap().all().unwrap();
                    let expected = if len >= size { (len - size) / shift + 1 } else { 0 };
                    assert_eq!(out.len(), expected, "len={len} size={size} shift={shift}");
                    for (i, w) in out.iter().enumerate() {
                        let start = i * shift;
                        assert_eq!(*w, (start..start + size).collect::<Vec<_>>());
                    }
                }
            }
        }
    }

    #[test]
    fn test_input_shorter_than_window() {
        let out = from_iter(0..2).window(3, None).unwrap().all().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(from_iter(0..2).window(0, None).is_err());
        assert!(from_iter(0..2).window(2, Some(0)).is_err());
    }

    #[test]
    fn test_window_over_infinite_input() {
        let out = from_fn(|| 0u64..).window(2, None).unwrap().take(2).unwrap();
        assert_eq!(out, vec![vec![0, 1], vec![2, 3]]);
    }
}
