//! Generation engine: exhaustive enumeration of `pick` combinations.
//!
//! A generator function produces one value per run and calls
//! [`GenerateContext::pick`] at decision points. The engine re-runs the
//! function, replaying earlier picks from a stack of child cursors and
//! branching on the frontier, until every combination has been visited. The
//! stack of cursors is the continuation: no suspension is needed, picks
//! nested inside branches vary fastest, and results come out in the
//! depth-first order of the implicit decision tree.

use crate::context::ForkContext;
use crate::error::{ForkError, ForkResult};
use crate::forker::{FixedForker, Forker, OnceForker};
use crate::iter::{BoxIter, ForkIter};
use std::any::Any;
use std::rc::Rc;
use tracing::trace;

/// Type-erased choice frame. Values travel as `Rc<dyn Any>` so frames of
/// different item types can share one stack; `pick` downcasts them back.
trait ChoiceFrame {
    fn valid(&self) -> bool;
    fn value(&self) -> Option<Rc<dyn Any>>;
    fn next(&mut self) -> ForkResult<()>;
    fn close(&mut self);
}

struct ErasedFrame<T> {
    iter: BoxIter<T>,
}

impl<T: Clone + 'static> ChoiceFrame for ErasedFrame<T> {
    fn valid(&self) -> bool {
        self.iter.valid()
    }

    fn value(&self) -> Option<Rc<dyn Any>> {
        self.iter.value().map(|v| Rc::new(v.clone()) as Rc<dyn Any>)
    }

    fn next(&mut self) -> ForkResult<()> {
        self.iter.next()
    }

    fn close(&mut self) {
        self.iter.close()
    }
}

/// Handle passed to a generator function; `pick` is its decision point.
pub struct GenerateContext<'a> {
    ctx: &'a ForkContext,
    idx: usize,
    stack: &'a mut Vec<Box<dyn ChoiceFrame>>,
}

impl<'a> GenerateContext<'a> {
    /// Choose one value from the forker's next cursor.
    ///
    /// Below the replay index the stored choice for this depth is returned;
    /// on the frontier the forker is forked and its first value taken.
    /// Asking for a choice from an empty domain is a model error.
    pub fn pick<F>(&mut self, forker: &F) -> ForkResult<F::Item>
    where
        F: Forker,
        F::Item: Clone + 'static,
    {
        let depth = self.idx;
        self.idx += 1;

        if let Some(frame) = self.stack.get(depth) {
            let stored = frame.value().ok_or(ForkError::InvalidIter)?;
            let stored = stored
                .downcast::<F::Item>()
                .map_err(|_| ForkError::PickTypeMismatch { depth })?;
            return Ok((*stored).clone());
        }

        let mut iter = forker.do_fork(self.ctx)?;
        if !iter.valid() {
            iter.close();
            return Err(ForkError::EmptyForker);
        }
        let first = iter.value().cloned().ok_or(ForkError::InvalidIter)?;
        trace!(depth, "materialized choice frame");
        self.stack.push(Box::new(ErasedFrame { iter }));
        Ok(first)
    }

    /// Choose one value from an already-created cursor. The cursor is
    /// adopted by the engine and iterated like any other choice frame.
    pub fn pick_iter<T>(&mut self, iter: BoxIter<T>) -> ForkResult<T>
    where
        T: Clone + 'static,
    {
        self.pick(&OnceForker::new(iter))
    }

    /// Choose from a fixed list; the first element is mandatory so the list
    /// is never empty.
    pub fn pick_enum<T>(&mut self, first: T, rest: impl IntoIterator<Item = T>) -> ForkResult<T>
    where
        T: Clone + 'static,
    {
        let mut items = vec![first];
        items.extend(rest);
        self.pick(&FixedForker::new(items))
    }

    /// Choose a boolean, `false` before `true`.
    pub fn pick_bool(&mut self) -> ForkResult<bool> {
        self.pick_enum(false, [true])
    }

    /// The cancellation handle for this enumeration.
    pub fn context(&self) -> &ForkContext {
        self.ctx
    }
}

type GenFn<T> = dyn Fn(&mut GenerateContext<'_>) -> ForkResult<T>;

/// Forker enumerating every combination of picks a generator function makes.
pub struct GenerationForker<T> {
    generator: Rc<GenFn<T>>,
}

impl<T> GenerationForker<T> {
    pub fn new(generator: impl Fn(&mut GenerateContext<'_>) -> ForkResult<T> + 'static) -> Self {
        Self {
            generator: Rc::new(generator),
        }
    }
}

impl<T> Clone for GenerationForker<T> {
    fn clone(&self) -> Self {
        Self {
            generator: Rc::clone(&self.generator),
        }
    }
}

impl<T: 'static> Forker for GenerationForker<T> {
    type Item = T;

    fn do_fork(&self, ctx: &ForkContext) -> ForkResult<BoxIter<T>> {
        Ok(Box::new(GenerationIter::new(
            ctx.clone(),
            Rc::clone(&self.generator),
        )))
    }
}

/// Cursor over the values a generator function produces, one per pick
/// combination.
///
/// The first run happens at construction. If it fails, the error is latched
/// instead of failing the fork: the cursor reports `valid()` with no current
/// value, and the first `next()` surfaces the error and closes. This keeps
/// all enumeration errors on the `next()` channel.
pub struct GenerationIter<T> {
    ctx: ForkContext,
    generator: Rc<GenFn<T>>,
    stack: Vec<Box<dyn ChoiceFrame>>,
    value: Option<T>,
    valid: bool,
    latched: Option<ForkError>,
}

impl<T> GenerationIter<T> {
    fn new(ctx: ForkContext, generator: Rc<GenFn<T>>) -> Self {
        let mut iter = Self {
            ctx,
            generator,
            stack: Vec::new(),
            value: None,
            valid: true,
            latched: None,
        };
        if let Err(err) = iter.regenerate() {
            iter.valid = true;
            iter.latched = Some(err);
        }
        iter
    }

    /// Re-run the generator for the current stack, then advance the stack to
    /// the next combination. Any failure closes the whole engine.
    fn regenerate(&mut self) -> ForkResult<()> {
        if let Err(err) = self.ctx.ensure_live() {
            self.close();
            return Err(err);
        }

        match self.run_generator() {
            Ok(value) => self.value = Some(value),
            Err(err) => {
                self.close();
                return Err(err);
            }
        }

        if let Err(err) = self.advance_stack() {
            self.close();
            return Err(err);
        }
        Ok(())
    }

    fn run_generator(&mut self) -> ForkResult<T> {
        let generator = Rc::clone(&self.generator);
        let mut gctx = GenerateContext {
            ctx: &self.ctx,
            idx: 0,
            stack: &mut self.stack,
        };
        generator(&mut gctx)
    }

    /// Advance the top cursor; pop exhausted cursors until one remains
    /// valid. An empty stack afterwards means the enumeration is complete.
    fn advance_stack(&mut self) -> ForkResult<()> {
        while let Some(top) = self.stack.last_mut() {
            top.next()?;
            if top.valid() {
                break;
            }
            top.close();
            self.stack.pop();
            trace!(depth = self.stack.len(), "retired choice frame");
        }
        Ok(())
    }
}

impl<T> ForkIter for GenerationIter<T> {
    type Item = T;

    fn valid(&self) -> bool {
        self.valid
    }

    fn value(&self) -> Option<&T> {
        if self.valid {
            self.value.as_ref()
        } else {
            None
        }
    }

    fn next(&mut self) -> ForkResult<()> {
        if let Some(err) = self.latched.take() {
            self.close();
            return Err(err);
        }
        if !self.valid {
            return Err(ForkError::InvalidIter);
        }
        if self.stack.is_empty() {
            self.close();
            return Ok(());
        }
        self.regenerate()
    }

    fn close(&mut self) {
        if !self.valid && self.latched.is_none() {
            return;
        }
        self.valid = false;
        self.latched = None;
        self.value = None;
        for frame in self.stack.iter_mut().rev() {
            frame.close();
        }
        self.stack.clear();
    }
}
