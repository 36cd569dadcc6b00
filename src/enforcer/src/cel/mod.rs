//! CEL (Common Expression Language) matcher evaluation
//!
//! The model's matcher expression is compiled once per enforcer and
//! evaluated for every candidate rule, with request fields bound as `r`,
//! rule fields as `p`, and the function registry plus `g`-family link
//! predicates available as functions.

pub mod context;
pub mod convert;
pub mod program;

pub use context::{root_context, rule_scope, POLICY_VAR, REQUEST_VAR};
pub use program::{MatcherProgram, SymbolTable};
