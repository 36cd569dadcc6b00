//! Role-based access control primitives
//!
//! - [`RoleManager`]: directed has-role graph, optionally partitioned by domain
//! - [`DefaultRoleManager`]: in-memory graph with visited-set, depth-bounded traversal
//! - [`make_link_predicate`]: the `g(a, b[, domain])` predicate used by matchers

pub mod link;
pub mod role_manager;

pub use link::{make_link_predicate, LinkPredicate};
pub use role_manager::{
    DefaultRoleManager, MatchingFn, RoleManager, SharedRoleManager, DEFAULT_MAX_HIERARCHY_LEVEL,
};
