//! Error types for concord-consensus.

use thiserror::Error;

/// Result type for concord-consensus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving an episode.
///
/// Nothing here is raised for bad analyzer output or missing snapshot
/// readings; those degrade to clamped or neutral values.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The episode is in the wrong lifecycle state for the request.
    #[error("invalid episode state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    /// The episode was aborted before convergence.
    #[error("episode has been aborted")]
    Aborted,
}
