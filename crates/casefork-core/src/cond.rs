//! Composable conditions over an opaque state.

use crate::error::ForkResult;
use std::rc::Rc;

enum CondKind<S> {
    Pred(Box<dyn Fn(&S) -> ForkResult<bool>>),
    All(Vec<Cond<S>>),
    Any(Vec<Cond<S>>),
    Not(Cond<S>),
}

/// A boolean predicate over a state, composed by [`Cond::and`], [`Cond::or`]
/// and [`Cond::not`].
///
/// Evaluation must be stable for a given state value: the engine evaluates
/// guards repeatedly on the same state and relies on consistent answers.
/// Cloning is cheap; the inner node is shared.
pub struct Cond<S>(Rc<CondKind<S>>);

impl<S> Clone for Cond<S> {
    fn clone(&self) -> Self {
        Cond(Rc::clone(&self.0))
    }
}

impl<S> Cond<S> {
    /// Condition from a fallible predicate.
    pub fn new(pred: impl Fn(&S) -> ForkResult<bool> + 'static) -> Self {
        Cond(Rc::new(CondKind::Pred(Box::new(pred))))
    }

    /// Condition from an infallible predicate.
    pub fn pred(pred: impl Fn(&S) -> bool + 'static) -> Self {
        Self::new(move |state| Ok(pred(state)))
    }

    /// Conjunction. Children evaluate left to right; the first false
    /// short-circuits and errors propagate immediately. The first child is
    /// mandatory so the conjunction is never empty.
    pub fn and(first: Cond<S>, rest: impl IntoIterator<Item = Cond<S>>) -> Self {
        let mut children = vec![first];
        children.extend(rest);
        Cond(Rc::new(CondKind::All(children)))
    }

    /// Disjunction; the dual of [`Cond::and`].
    pub fn or(first: Cond<S>, rest: impl IntoIterator<Item = Cond<S>>) -> Self {
        let mut children = vec![first];
        children.extend(rest);
        Cond(Rc::new(CondKind::Any(children)))
    }

    /// Negation; errors pass through.
    pub fn not(self) -> Self {
        Cond(Rc::new(CondKind::Not(self)))
    }

    /// Evaluate against a state.
    pub fn evaluate(&self, state: &S) -> ForkResult<bool> {
        match &*self.0 {
            CondKind::Pred(pred) => pred(state),
            CondKind::All(children) => {
                for child in children {
                    if !child.evaluate(state)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            CondKind::Any(children) => {
                for child in children {
                    if child.evaluate(state)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            CondKind::Not(child) => Ok(!child.evaluate(state)?),
        }
    }
}
