//! `g()` link predicates backed by a role manager

use std::sync::Arc;

use super::role_manager::SharedRoleManager;

/// `g(name1, name2[, domain])`
pub type LinkPredicate = Arc<dyn Fn(&str, &str, Option<&str>) -> bool + Send + Sync>;

/// Build the link predicate for one grouping relation.
///
/// Without a role manager the predicate degrades to plain equality.
///
/// ```
/// use cretoai_enforcer::rbac::{make_link_predicate, DefaultRoleManager, RoleManager};
///
/// let rm = DefaultRoleManager::default().into_shared();
/// rm.write().add_link("alice", "admin", None);
///
/// let g = make_link_predicate(Some(rm));
/// assert!(g("alice", "admin", None));
///
/// let eq = make_link_predicate(None);
/// assert!(!eq("alice", "admin", None));
/// ```
pub fn make_link_predicate(role_manager: Option<SharedRoleManager>) -> LinkPredicate {
    match role_manager {
        None => Arc::new(|name1: &str, name2: &str, _domain: Option<&str>| name1 == name2),
        Some(rm) => Arc::new(move |name1: &str, name2: &str, domain: Option<&str>| {
            rm.read().has_link(name1, name2, domain)
        }),
    }
}
