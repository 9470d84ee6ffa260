//! Forkers: one-shot factories of fresh cursors.

use crate::context::ForkContext;
use crate::error::{ForkError, ForkResult};
use crate::iter::{BoxIter, FixedIter};
use std::cell::RefCell;
use std::rc::Rc;

/// A factory producing a fresh cursor on every call.
///
/// Within one enumeration a forker must answer deterministically: same
/// values, same order, on every call. The generation engine forks a given
/// pick depth exactly once per materialized frame and replays the cursor it
/// got, so a factory that answers differently across calls would
/// desynchronize replay.
pub trait Forker {
    type Item;

    fn do_fork(&self, ctx: &ForkContext) -> ForkResult<BoxIter<Self::Item>>;
}

/// Forker over a caller-supplied factory closure.
pub struct SimpleForker<T> {
    create: Rc<dyn Fn(&ForkContext) -> ForkResult<BoxIter<T>>>,
}

impl<T> SimpleForker<T> {
    pub fn new(create: impl Fn(&ForkContext) -> ForkResult<BoxIter<T>> + 'static) -> Self {
        Self {
            create: Rc::new(create),
        }
    }
}

impl<T> Clone for SimpleForker<T> {
    fn clone(&self) -> Self {
        Self {
            create: Rc::clone(&self.create),
        }
    }
}

impl<T> Forker for SimpleForker<T> {
    type Item = T;

    fn do_fork(&self, ctx: &ForkContext) -> ForkResult<BoxIter<T>> {
        (self.create)(ctx)
    }
}

/// Forker over a fixed list of values.
pub struct FixedForker<T> {
    items: Vec<T>,
}

impl<T> FixedForker<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> Clone for FixedForker<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: Clone + 'static> Forker for FixedForker<T> {
    type Item = T;

    fn do_fork(&self, _ctx: &ForkContext) -> ForkResult<BoxIter<T>> {
        Ok(Box::new(FixedIter::new(self.items.clone())))
    }
}

/// Adapter turning an already-created cursor into a forker that can be
/// forked exactly once. The second fork fails: the cursor is gone.
pub struct OnceForker<T> {
    iter: RefCell<Option<BoxIter<T>>>,
}

impl<T> OnceForker<T> {
    pub fn new(iter: BoxIter<T>) -> Self {
        Self {
            iter: RefCell::new(Some(iter)),
        }
    }
}

impl<T> Forker for OnceForker<T> {
    type Item = T;

    fn do_fork(&self, _ctx: &ForkContext) -> ForkResult<BoxIter<T>> {
        self.iter.borrow_mut().take().ok_or(ForkError::IterConsumed)
    }
}
