//! Error types for the coordination (swarm engine) crate.
//!
//! Follows the project convention: one `thiserror`-derived enum with named
//! variants, `#[from]` wrapping for foreign errors, and constructor helpers
//! for the common cases.

use thiserror::Error;

/// Result type alias for coordination operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the swarm engine's public API.
///
/// Fatal contract violations (invalid arguments, malformed judge decisions)
/// are returned as `Err`. Agent-level failures (timeouts, non-zero exits,
/// schema mismatches) never appear here — they are carried in-band inside
/// `ExecResult::status` so that one item's failure never aborts its siblings.
#[derive(Error, Debug)]
pub enum Error {
    /// A constructor or call site received an invalid combination of options.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A best-of judge returned a decision that could not be parsed, or
    /// whose `winner` index was out of range for the candidate set.
    #[error("bestof judge returned invalid decision: {message}")]
    InvalidJudgeDecision { message: String },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_judge_decision(message: impl Into<String>) -> Self {
        Self::InvalidJudgeDecision {
            message: message.into(),
        }
    }
}
