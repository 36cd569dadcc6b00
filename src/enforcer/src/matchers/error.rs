//! Error types for matcher functions

use thiserror::Error;

/// Matcher function errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// keyMatch4 captured a different number of values than it has tokens.
    /// Indicates a malformed pattern (e.g. user-supplied regex groups), not a mismatch.
    #[error("keyMatch4: number of tokens ({tokens}) is not equal to number of values ({values})")]
    TokenCountMismatch { tokens: usize, values: usize },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("{function} expects at least {expected} arguments, got {got}")]
    MissingArgument {
        function: String,
        expected: usize,
        got: usize,
    },
}

/// Result type for matcher functions
pub type Result<T> = std::result::Result<T, MatchError>;
