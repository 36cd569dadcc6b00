//! Error types for the policy enforcer

use thiserror::Error;

/// Policy enforcer errors
#[derive(Debug, Error)]
pub enum EnforcerError {
    /// Model definition is incomplete or inconsistent
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Matcher expression failed to compile or references unbound symbols
    #[error("Invalid matcher: {0}")]
    InvalidMatcher(String),

    /// Matcher evaluation failed at decision time
    #[error("Matcher evaluation failed: {0}")]
    Evaluation(String),

    /// A registered matcher function reported a failure
    #[error("Function '{name}' failed: {message}")]
    Function { name: String, message: String },

    /// Request does not fit the request definition
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rule does not fit its policy definition
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Section/ptype pair is not declared by the model
    #[error("Unknown policy type: {section}.{ptype}")]
    UnknownPolicyType { section: String, ptype: String },

    /// Rule to update does not exist
    #[error("Policy not found: {0:?}")]
    PolicyNotFound(Vec<String>),

    /// Replacement rule already exists
    #[error("Policy already exists: {0:?}")]
    PolicyExists(Vec<String>),

    /// Policy adapter failure
    #[error("Adapter error: {0}")]
    Adapter(String),
}

/// Result type for enforcer operations
pub type Result<T> = std::result::Result<T, EnforcerError>;
