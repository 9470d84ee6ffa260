//! FSM layer of the casefork test-case generator.
//!
//! A model is a set of named, guarded actions over a caller-defined state.
//! Exploration enumerates action paths, deduplicating transitions by the
//! state's signature, and emits one replayable case per first-visit
//! transition.

pub mod action;
pub mod builder;
pub mod explorer;

pub use action::{FsmAction, FsmEffect, FsmState};
pub use builder::{ActionSeed, BuildError, FsmForkerBuilder, WhenBuilder};
pub use explorer::{FsmForker, FsmForkResult};
