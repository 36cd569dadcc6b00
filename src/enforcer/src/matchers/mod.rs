//! Matcher function library
//!
//! Stateless pattern predicates used inside matcher expressions, and the
//! open registry that exposes them (plus any embedder-supplied functions)
//! to the expression evaluator.

pub mod builtin;
pub mod error;
pub mod registry;

pub use builtin::{
    glob_match, ip_match, key_match, key_match2, key_match3, key_match4, regex_match,
};
pub use error::MatchError;
pub use registry::{FunctionRegistry, MatcherFunction};
