// rust/pipeline-core/src/dataset/combinators.rs

//! Element-wise and structural combinators.
//!
//! Each node owns its upstream node(s) and does no work until iterated.
//! Errors from upstream are forwarded unchanged at the position they occur.

use std::marker::PhantomData;
use std::ops::Add;

use crate::context::WorkerContext;
use crate::error::Result;

use super::shuffle::Shuffle;
use super::source::{RangeDataset, SliceDataset, StreamDataset};
use super::traits::{Dataset, Records};
use super::window::Window;

/// Node produced by [`Dataset::map`].
pub struct Map<D, F> {
    dataset: D,
    f: F,
}

impl<D, F> Map<D, F> {
    pub(crate) fn new(dataset: D, f: F) -> Self {
        Self { dataset, f }
    }
}

impl<D, F, U> Dataset for Map<D, F>
where
    D: Dataset,
    F: Fn(D::Item) -> U,
{
    type Item = U;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, U>> {
        let f = &self.f;
        let records = self.dataset.iter_with(ctx)?;
        Ok(Box::new(records.map(move |record| record.map(f))))
    }
}

/// Node produced by [`Dataset::flat_map`].
pub struct FlatMap<D, F, I> {
    dataset: D,
    f: F,
    _output: PhantomData<fn() -> I>,
}

impl<D, F, I> FlatMap<D, F, I> {
    pub(crate) fn new(dataset: D, f: F) -> Self {
        Self {
            dataset,
            f,
            _output: PhantomData,
        }
    }
}

impl<D, F, I> Dataset for FlatMap<D, F, I>
where
    D: Dataset,
    F: Fn(D::Item) -> I,
    I: IntoIterator,
{
    type Item = I::Item;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, I::Item>> {
        Ok(Box::new(FlatMapIter {
            records: self.dataset.iter_with(ctx)?,
            f: &self.f,
            current: None::<I::IntoIter>,
        }))
    }
}

struct FlatMapIter<'a, T, F, J> {
    records: Records<'a, T>,
    f: &'a F,
    current: Option<J>,
}

impl<T, F, I, J> Iterator for FlatMapIter<'_, T, F, J>
where
    F: Fn(T) -> I,
    I: IntoIterator<IntoIter = J>,
    J: Iterator,
{
    type Item = Result<J::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = self.current.as_mut() {
                if let Some(item) = inner.next() {
                    return Some(Ok(item));
                }
                self.current = None;
            }

            match self.records.next()? {
                Ok(record) => self.current = Some((self.f)(record).into_iter()),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Node produced by [`Dataset::filter`].
pub struct Filter<D, P> {
    dataset: D,
    predicate: P,
}

impl<D, P> Filter<D, P> {
    pub(crate) fn new(dataset: D, predicate: P) -> Self {
        Self { dataset, predicate }
    }
}

impl<D, P> Dataset for Filter<D, P>
where
    D: Dataset,
    P: Fn(&D::Item) -> bool,
{
    type Item = D::Item;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, D::Item>> {
        let predicate = &self.predicate;
        let records = self.dataset.iter_with(ctx)?;
        Ok(Box::new(records.filter(move |record| match record {
            Ok(item) => predicate(item),
            Err(_) => true,
        })))
    }
}

/// Node produced by [`Dataset::apply`].
pub struct Apply<D, G, U> {
    dataset: D,
    transform: G,
    _output: PhantomData<fn() -> U>,
}

impl<D, G, U> Apply<D, G, U> {
    pub(crate) fn new(dataset: D, transform: G) -> Self {
        Self {
            dataset,
            transform,
            _output: PhantomData,
        }
    }
}

impl<D, G, U> Dataset for Apply<D, G, U>
where
    D: Dataset,
    G: for<'a> Fn(Records<'a, D::Item>) -> Records<'a, U>,
{
    type Item = U;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, U>> {
        Ok((self.transform)(self.dataset.iter_with(ctx)?))
    }
}

/// Node produced by [`Dataset::concat`].
///
/// Each part is opened only once the previous one is exhausted, so at most
/// one part's resources are held at a time.
pub struct Concat<D, E> {
    head: D,
    tail: Vec<E>,
}

impl<D, E> Concat<D, E> {
    pub(crate) fn new(head: D, tail: Vec<E>) -> Self {
        Self { head, tail }
    }
}

impl<D, E> Dataset for Concat<D, E>
where
    D: Dataset,
    E: Dataset<Item = D::Item>,
{
    type Item = D::Item;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, D::Item>> {
        Ok(Box::new(ConcatIter {
            current: Some(self.head.iter_with(ctx)?),
            pending: self.tail.iter(),
            ctx,
        }))
    }
}

struct ConcatIter<'a, T, E> {
    current: Option<Records<'a, T>>,
    pending: std::slice::Iter<'a, E>,
    ctx: Option<WorkerContext>,
}

impl<'a, T, E> Iterator for ConcatIter<'a, T, E>
where
    E: Dataset<Item = T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(records) = self.current.as_mut() {
                if let Some(item) = records.next() {
                    return Some(item);
                }
                self.current = None;
            }

            let next = self.pending.next()?;
            match next.iter_with(self.ctx) {
                Ok(records) => self.current = Some(records),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Node produced by [`Dataset::zip`].
pub struct Zip<D, E> {
    left: D,
    right: E,
}

impl<D, E> Zip<D, E> {
    pub(crate) fn new(left: D, right: E) -> Self {
        Self { left, right }
    }
}

impl<D, E> Dataset for Zip<D, E>
where
    D: Dataset,
    E: Dataset,
{
    type Item = (D::Item, E::Item);

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, Self::Item>> {
        let mut left = self.left.iter_with(ctx)?;
        let mut right = self.right.iter_with(ctx)?;

        Ok(Box::new(std::iter::from_fn(move || {
            let a = left.next()?;
            let b = right.next()?;
            Some(a.and_then(|a| b.map(|b| (a, b))))
        })))
    }
}

/// Node produced by [`Dataset::zip_all`].
pub struct ZipAll<D, E> {
    head: D,
    tail: Vec<E>,
}

impl<D, E> ZipAll<D, E> {
    pub(crate) fn new(head: D, tail: Vec<E>) -> Self {
        Self { head, tail }
    }
}

impl<D, E> Dataset for ZipAll<D, E>
where
    D: Dataset,
    E: Dataset<Item = D::Item>,
{
    type Item = Vec<D::Item>;

    fn iter_with(&self, ctx: Option<WorkerContext>) -> Result<Records<'_, Self::Item>> {
        let mut inputs = Vec::with_capacity(self.tail.len() + 1);
        inputs.push(self.head.iter_with(ctx)?);
        for dataset in &self.tail {
            inputs.push(dataset.iter_with(ctx)?);
        }

        Ok(Box::new(std::iter::from_fn(move || {
            let mut row = Vec::with_capacity(inputs.len());
            for input in inputs.iter_mut() {
                row.push(input.next()?);
            }
            Some(row.into_iter().collect::<Result<Vec<_>>>())
        })))
    }
}

/// `a + b` is `a.concat([b])`.
macro_rules! impl_concat_operator {
    ($($node:ident<$($param:ident),*>),* $(,)?) => {
        $(
            impl<$($param,)* R> Add<R> for $node<$($param),*>
            where
                $node<$($param),*>: Dataset,
                R: Dataset<Item = <$node<$($param),*> as Dataset>::Item>,
            {
                type Output = Concat<Self, R>;

                fn add(self, rhs: R) -> Self::Output {
                    Concat::new(self, vec![rhs])
                }
            }
        )*
    };
}

impl_concat_operator!(
    Map<D, F>,
    FlatMap<D, F, I>,
    Filter<D, P>,
    Apply<D, G, U>,
    Concat<D, E>,
    Zip<D, E>,
    ZipAll<D, E>,
    Shuffle<D>,
    Window<D>,
    StreamDataset<S>,
    SliceDataset<S>,
);

impl<R> Add<R> for RangeDataset
where
    R: Dataset<Item = i64>,
{
    type Output = Concat<Self, R>;

    fn add(self, rhs: R) -> Self::Output {
        Concat::new(self, vec![rhs])
    }
}
