//! Error taxonomy for the convective parametrization core.
//!
//! Every failure in this crate is unrecoverable for the current run:
//! a long simulation that silently continues past bad configuration,
//! lost exchange traffic, or non-finite arithmetic produces invalid
//! physics that is far more expensive than an abort. There are no
//! retries anywhere.
//!
//! Logic invariant violations (reading the trigger time of an inactive
//! cell, indexing outside the local partition) are not represented
//! here; those are programming errors and fail fast via `assert!`.

use crate::exchange::ExchangePhase;

/// Fatal errors raised by the convection core.
#[derive(Debug, thiserror::Error)]
pub enum ConvError {
    /// Invalid run parameter at startup, or request geometry that
    /// diverges from the partition grid. Never clamped.
    #[error("configuration error: {0}")]
    Config(String),

    /// A ring exchange send/receive failed or timed out. Identifies
    /// the neighbor rank and protocol phase for diagnostics.
    #[error("transport error with neighbor rank {neighbor_rank} during {phase}: {detail}")]
    Transport {
        /// Rank of the neighbor partition involved in the failed link.
        neighbor_rank: usize,
        /// Protocol phase that was in flight.
        phase: ExchangePhase,
        /// Human-readable failure description.
        detail: String,
    },

    /// Non-finite value (NaN/Inf) encountered in input fields or in
    /// the synthesized heating field.
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Received event arrays disagree in length. Transports wrap this
    /// into [`ConvError::Transport`] with the offending neighbor rank.
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),

    /// Array shape disagreement between the caller's fields and the
    /// local partition.
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which array disagreed.
        what: &'static str,
        /// Expected element count (the local partition size).
        expected: usize,
        /// Element count actually supplied.
        got: usize,
    },
}

/// Convenience alias used throughout the crate.
pub type ConvResult<T> = Result<T, ConvError>;
