//! FSM exploration: one emitted case per first-visit transition.

use crate::action::{FsmAction, FsmState};
use ahash::AHashSet;
use casefork_core::{
    BoxIter, FixedForker, ForkContext, ForkResult, Forker, GenerateContext, GenerationForker,
};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

/// One emitted case: a terminal state and the ordered actions that produced
/// it from a fresh initial state.
pub struct FsmForkResult<S> {
    final_state: S,
    path: Vec<Rc<FsmAction<S>>>,
}

impl<S> FsmForkResult<S> {
    pub fn final_state(&self) -> &S {
        &self.final_state
    }

    pub fn path(&self) -> &[Rc<FsmAction<S>>] {
        &self.path
    }

    /// Apply the path, in order, to a caller-supplied state. Replaying onto
    /// a fresh initial state reproduces the final state's signature.
    pub fn replay_onto(&self, ctx: &ForkContext, state: &mut S) -> ForkResult<()> {
        for action in &self.path {
            action.apply(ctx, state)?;
        }
        Ok(())
    }
}

impl<S: Clone> Clone for FsmForkResult<S> {
    fn clone(&self) -> Self {
        Self {
            final_state: self.final_state.clone(),
            path: self.path.clone(),
        }
    }
}

/// Explores a guarded state machine.
///
/// Exploration is a depth-first unfold expressed as a generation function:
/// each step picks one enabled action whose deduplication key
/// `state.signature(action.name)` has not been seen, or a stop sentinel that
/// terminates the path. The chosen key is recorded before the effect runs,
/// so every `(equivalence class, action)` pair is taken as a transition at
/// most once across the whole enumeration, and exploration terminates for
/// any model whose reachable signature set is finite.
pub struct FsmForker<S> {
    initial_state: Rc<dyn Fn() -> ForkResult<S>>,
    actions: Vec<Rc<FsmAction<S>>>,
}

impl<S> std::fmt::Debug for FsmForker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsmForker")
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl<S: FsmState + 'static> FsmForker<S> {
    pub(crate) fn new(
        initial_state: Rc<dyn Fn() -> ForkResult<S>>,
        actions: Vec<Rc<FsmAction<S>>>,
    ) -> Self {
        Self {
            initial_state,
            actions,
        }
    }

    /// The model's actions, in declaration order.
    pub fn actions(&self) -> &[Rc<FsmAction<S>>] {
        &self.actions
    }

    /// Create a fresh initial state from the model's factory.
    pub fn initial_state(&self) -> ForkResult<S> {
        (self.initial_state)()
    }
}

impl<S: FsmState + 'static> Forker for FsmForker<S> {
    type Item = FsmForkResult<S>;

    /// Each call starts an independent exploration with its own seen set.
    fn do_fork(&self, ctx: &ForkContext) -> ForkResult<BoxIter<FsmForkResult<S>>> {
        debug!(actions = self.actions.len(), "starting fsm exploration");
        let factory = Rc::clone(&self.initial_state);
        let actions = self.actions.clone();
        let seen: Rc<RefCell<AHashSet<String>>> = Rc::new(RefCell::new(AHashSet::new()));

        let generation = GenerationForker::new(move |g: &mut GenerateContext<'_>| {
            let mut state = factory()?;
            seen.borrow_mut().insert(state.signature(""));

            let mut path: Vec<Rc<FsmAction<S>>> = Vec::new();
            loop {
                // Enabled actions whose pre-state key is unseen, then the
                // stop sentinel. During replay the picked value comes from
                // the stored frame and this list is ignored.
                let mut choices: SmallVec<[Option<Rc<FsmAction<S>>>; 8]> = SmallVec::new();
                for action in &actions {
                    if !action.condition().evaluate(&state)? {
                        continue;
                    }
                    if !seen.borrow().contains(&state.signature(action.name())) {
                        choices.push(Some(Rc::clone(action)));
                    }
                }
                choices.push(None);

                match g.pick(&FixedForker::new(choices.into_vec()))? {
                    None => {
                        trace!(steps = path.len(), "emitting case");
                        return Ok(FsmForkResult {
                            final_state: state,
                            path,
                        });
                    }
                    Some(action) => {
                        seen.borrow_mut().insert(state.signature(action.name()));
                        action.apply(g.context(), &mut state)?;
                        path.push(action);
                    }
                }
            }
        });

        generation.do_fork(ctx)
    }
}
