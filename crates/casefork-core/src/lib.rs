//! Forking enumeration engine for model-based test-case generation.
//!
//! A [`Forker`] produces fresh cursors over a finite domain of values; a
//! [`GenerationForker`] lifts a `pick`-driven generator function into an
//! exhaustive, deterministic enumeration of every combination of picks.

pub mod cond;
pub mod context;
pub mod error;
pub mod forker;
pub mod generate;
pub mod iter;

pub use cond::Cond;
pub use context::ForkContext;
pub use error::{ForkError, ForkResult};
pub use forker::{FixedForker, Forker, OnceForker, SimpleForker};
pub use generate::{GenerateContext, GenerationForker, GenerationIter};
pub use iter::{drain, BoxIter, FixedIter, ForkIter};
