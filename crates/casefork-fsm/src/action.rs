//! FSM model: state contract and guarded actions.

use casefork_core::{Cond, ForkContext, ForkResult};
use std::fmt;
use std::rc::Rc;

/// Caller-defined abstract state.
///
/// `signature` is the canonical projection used as the deduplication key
/// during exploration: two states with equal signatures are the same node in
/// the exploration graph. It receives the name of the candidate action about
/// to fire and is free to fold it into the key, making the equivalence class
/// "(abstract state, next transition)" rather than abstract state alone;
/// implementations whose state already encodes enough context may ignore the
/// argument.
///
/// The engine never looks inside a state beyond this projection, and it
/// never clones states: each enumerated path starts from a fresh call to the
/// model's initial-state factory.
pub trait FsmState {
    fn signature(&self, next_action: &str) -> String;
}

/// Effect of an action: an in-place mutation of the state.
pub type FsmEffect<S> = Rc<dyn Fn(&ForkContext, &mut S) -> ForkResult<()>>;

/// A named, guarded, in-place mutation of a state.
pub struct FsmAction<S> {
    name: String,
    when: Cond<S>,
    effect: FsmEffect<S>,
}

impl<S> FsmAction<S> {
    pub(crate) fn new(name: String, when: Cond<S>, effect: FsmEffect<S>) -> Self {
        Self { name, when, effect }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> &Cond<S> {
        &self.when
    }

    /// Run the effect against a state.
    pub fn apply(&self, ctx: &ForkContext, state: &mut S) -> ForkResult<()> {
        (self.effect)(ctx, state)
    }
}

impl<S> fmt::Debug for FsmAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
