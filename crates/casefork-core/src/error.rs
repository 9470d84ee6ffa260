//! Error types for the enumeration layer.

use thiserror::Error;

/// Enumeration error.
///
/// The first error encountered anywhere in an enumeration closes every
/// stacked cursor and surfaces on the outer cursor's `next()`.
#[derive(Debug, Error)]
pub enum ForkError {
    /// `next()` was called on a cursor that is no longer valid.
    #[error("iter is invalid")]
    InvalidIter,

    /// A one-shot forker was forked a second time.
    #[error("iter used")]
    IterConsumed,

    /// A generator asked for a choice from an empty domain.
    #[error("forker is empty")]
    EmptyForker,

    /// A replayed pick requested a different type than the stored choice.
    /// Only possible when a generator is itself nondeterministic in the
    /// types it picks, which is a model error.
    #[error("replayed pick at depth {depth} changed type")]
    PickTypeMismatch { depth: usize },

    /// Enumeration was cancelled through the fork context.
    #[error("enumeration cancelled")]
    Cancelled,

    /// Error returned by a caller-supplied callback: a condition, an action
    /// effect, a state factory, or a generator body.
    #[error(transparent)]
    Callback(Box<dyn std::error::Error + Send + Sync>),
}

impl ForkError {
    /// Wrap a caller-side error.
    pub fn callback(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ForkError::Callback(err.into())
    }
}

pub type ForkResult<T> = Result<T, ForkError>;
