//! Fluent builder for FSM forkers.

use crate::action::{FsmAction, FsmEffect, FsmState};
use crate::explorer::FsmForker;
use casefork_core::{drain, Cond, ForkContext, ForkError, ForkResult, Forker};
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Model error reported by [`FsmForkerBuilder::build`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("action name should not be empty")]
    EmptyName,

    #[error("duplicated action name: {0}")]
    DuplicateName(String),

    #[error("failed to expand action forker")]
    ForkAction(#[source] ForkError),
}

/// Seed for one action produced by an action forker: `(name, effect)`.
pub type ActionSeed<S> = (String, FsmEffect<S>);

/// Builder for [`FsmForker`]. Actions are declared inside [`when`] groups
/// sharing a guard, or one-off through [`FsmForkerBuilder::action`].
///
/// [`when`]: FsmForkerBuilder::when
pub struct FsmForkerBuilder<S> {
    initial_state: Rc<dyn Fn() -> ForkResult<S>>,
    actions: Vec<Rc<FsmAction<S>>>,
    pending_err: Option<BuildError>,
}

impl<S: FsmState + 'static> FsmForkerBuilder<S> {
    /// Start an empty model around an initial-state factory. The factory is
    /// called once per enumerated path.
    pub fn new(initial_state: impl Fn() -> ForkResult<S> + 'static) -> Self {
        Self {
            initial_state: Rc::new(initial_state),
            actions: Vec::new(),
            pending_err: None,
        }
    }

    /// Open a group of actions sharing `cond` as their guard.
    pub fn when(self, cond: Cond<S>) -> WhenBuilder<S> {
        WhenBuilder {
            cond,
            builder: self,
        }
    }

    /// Declare a one-off action outside any `when` group.
    pub fn action(
        self,
        name: impl Into<String>,
        effect: impl Fn(&ForkContext, &mut S) -> ForkResult<()> + 'static,
        cond: Cond<S>,
    ) -> Self {
        self.when(cond).action(name, effect).end_when()
    }

    fn push(&mut self, name: String, cond: Cond<S>, effect: FsmEffect<S>) {
        self.actions.push(Rc::new(FsmAction::new(name, cond, effect)));
    }

    /// Validate the model and freeze it into an [`FsmForker`].
    pub fn build(self) -> Result<FsmForker<S>, BuildError> {
        if let Some(err) = self.pending_err {
            return Err(err);
        }

        let mut names: HashSet<&str> = HashSet::with_capacity(self.actions.len());
        for action in &self.actions {
            if action.name().is_empty() {
                return Err(BuildError::EmptyName);
            }
            if !names.insert(action.name()) {
                return Err(BuildError::DuplicateName(action.name().to_string()));
            }
        }

        debug!(actions = self.actions.len(), "built fsm forker");
        Ok(FsmForker::new(self.initial_state, self.actions))
    }
}

/// Builder scope for actions sharing one guard.
pub struct WhenBuilder<S> {
    cond: Cond<S>,
    builder: FsmForkerBuilder<S>,
}

impl<S: FsmState + 'static> WhenBuilder<S> {
    /// Append one action carrying the group's guard.
    pub fn action(
        mut self,
        name: impl Into<String>,
        effect: impl Fn(&ForkContext, &mut S) -> ForkResult<()> + 'static,
    ) -> Self {
        let cond = self.cond.clone();
        self.builder.push(name.into(), cond, Rc::new(effect));
        self
    }

    /// Drain a forker of `(name, effect)` seeds, appending each as an action
    /// carrying the group's guard. The forker is consumed eagerly at build
    /// time; its first error aborts the build.
    pub fn fork_action<F>(mut self, forker: &F) -> Self
    where
        F: Forker<Item = ActionSeed<S>>,
    {
        if self.builder.pending_err.is_some() {
            return self;
        }

        let seeds = forker
            .do_fork(&ForkContext::new())
            .and_then(|iter| drain(iter));
        match seeds {
            Ok(seeds) => {
                for (name, effect) in seeds {
                    let cond = self.cond.clone();
                    self.builder.push(name, cond, effect);
                }
            }
            Err(err) => self.builder.pending_err = Some(BuildError::ForkAction(err)),
        }
        self
    }

    /// Close the group, returning to the outer builder.
    pub fn end_when(self) -> FsmForkerBuilder<S> {
        self.builder
    }
}
