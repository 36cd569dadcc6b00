//! Role graph with pattern-aware, depth-bounded reachability
//!
//! Edges point from a member (user or role) to the role it inherits. Edges
//! may be partitioned by domain; edges added without a domain live in a
//! dedicated default domain and are only visible to queries without a
//! domain.

use indexmap::IndexSet;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Default bound on the number of edges followed by a reachability query
pub const DEFAULT_MAX_HIERARCHY_LEVEL: usize = 10;

/// Name matcher: `(name, pattern) -> bool`
pub type MatchingFn = fn(&str, &str) -> bool;

/// Role manager shared between the enforcer and its link predicates
pub type SharedRoleManager = Arc<RwLock<dyn RoleManager>>;

/// Has-role graph contract used by link predicates and policy mutations
pub trait RoleManager: Send + Sync {
    /// Add an inheritance edge `name1 -> name2`; idempotent
    fn add_link(&mut self, name1: &str, name2: &str, domain: Option<&str>);

    /// Remove the edge `name1 -> name2` if present
    fn delete_link(&mut self, name1: &str, name2: &str, domain: Option<&str>);

    /// Whether `name1` reaches `name2` (reflexive, transitive)
    fn has_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> bool;

    /// Roles directly inherited by `name`
    fn get_roles(&self, name: &str, domain: Option<&str>) -> Vec<String>;

    /// Members that directly inherit `name`
    fn get_users(&self, name: &str, domain: Option<&str>) -> Vec<String>;

    /// All roles reachable from `name`, nearest first
    fn get_implicit_roles(&self, name: &str, domain: Option<&str>) -> Vec<String>;

    /// Drop every edge in every domain
    fn clear(&mut self);
}

/// Adjacency for one domain
#[derive(Debug, Default, Clone)]
struct DomainGraph {
    /// member -> inherited roles
    parents: HashMap<String, IndexSet<String>>,
    /// role -> direct members
    children: HashMap<String, IndexSet<String>>,
}

impl DomainGraph {
    fn add(&mut self, child: &str, parent: &str) -> bool {
        let inserted = self
            .parents
            .entry(child.to_string())
            .or_default()
            .insert(parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
        inserted
    }

    fn remove(&mut self, child: &str, parent: &str) -> bool {
        let removed = match self.parents.get_mut(child) {
            Some(roles) => {
                let removed = roles.shift_remove(parent);
                if roles.is_empty() {
                    self.parents.remove(child);
                }
                removed
            }
            None => false,
        };

        if let Some(members) = self.children.get_mut(parent) {
            members.shift_remove(child);
            if members.is_empty() {
                self.children.remove(parent);
            }
        }

        removed
    }

    fn nodes(&self) -> impl Iterator<Item = &String> {
        self.parents.keys().chain(self.children.keys())
    }

    fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// In-memory [`RoleManager`]
///
/// # Pattern matching
///
/// With a name matching function installed (e.g. [`key_match2`]), role
/// names stored in the graph may be patterns: a stored edge parent matches
/// the query target when `matching_fn(target, parent)` holds, and stored
/// members whose names match the queried name seed the traversal.
///
/// # Example
///
/// ```
/// use cretoai_enforcer::rbac::{DefaultRoleManager, RoleManager};
///
/// let mut rm = DefaultRoleManager::new(10);
/// rm.add_link("alice", "admin", None);
/// rm.add_link("admin", "root", None);
///
/// assert!(rm.has_link("alice", "root", None));
/// ```
///
/// [`key_match2`]: crate::matchers::key_match2
#[derive(Debug, Clone)]
pub struct DefaultRoleManager {
    /// Edges added without a domain
    default_graph: DomainGraph,

    /// Edges keyed by domain
    domains: HashMap<String, DomainGraph>,

    /// Maximum number of edges followed by a query
    max_hierarchy_level: usize,

    /// Optional matcher for pattern role names
    matching_fn: Option<MatchingFn>,

    /// Optional matcher for pattern domain names
    domain_matching_fn: Option<MatchingFn>,
}

impl DefaultRoleManager {
    /// Create a role manager bounding traversals to `max_hierarchy_level` edges
    pub fn new(max_hierarchy_level: usize) -> Self {
        Self {
            default_graph: DomainGraph::default(),
            domains: HashMap::new(),
            max_hierarchy_level,
            matching_fn: None,
            domain_matching_fn: None,
        }
    }

    /// Install a name matching function for pattern role names
    pub fn with_matching_fn(mut self, matching_fn: MatchingFn) -> Self {
        self.matching_fn = Some(matching_fn);
        self
    }

    /// Install a domain matching function for pattern domains
    pub fn with_domain_matching_fn(mut self, domain_matching_fn: MatchingFn) -> Self {
        self.domain_matching_fn = Some(domain_matching_fn);
        self
    }

    pub fn max_hierarchy_level(&self) -> usize {
        self.max_hierarchy_level
    }

    /// Wrap into a [`SharedRoleManager`]
    pub fn into_shared(self) -> SharedRoleManager {
        Arc::new(RwLock::new(self))
    }

    fn graph_mut(&mut self, domain: Option<&str>) -> &mut DomainGraph {
        match domain {
            None => &mut self.default_graph,
            Some(d) => self.domains.entry(d.to_string()).or_default(),
        }
    }

    /// Graphs visible to a query in `domain`
    fn graphs(&self, domain: Option<&str>) -> Vec<&DomainGraph> {
        let Some(domain) = domain else {
            return vec![&self.default_graph];
        };

        let mut graphs: Vec<&DomainGraph> = self.domains.get(domain).into_iter().collect();

        if let Some(matches) = self.domain_matching_fn {
            graphs.extend(
                self.domains
                    .iter()
                    .filter(|(stored, _)| stored.as_str() != domain && matches(domain, stored))
                    .map(|(_, graph)| graph),
            );
        }

        graphs
    }

    fn name_matches(&self, name: &str, pattern: &str) -> bool {
        name == pattern || self.matching_fn.is_some_and(|matches| matches(name, pattern))
    }

    /// Traversal start points: the name itself plus stored pattern names it matches
    fn seeds(&self, name: &str, graphs: &[&DomainGraph]) -> Vec<String> {
        let mut seeds = vec![name.to_string()];

        if let Some(matches) = self.matching_fn {
            let mut seen: HashSet<&str> = HashSet::new();
            for graph in graphs {
                for node in graph.parents.keys() {
                    if node != name && seen.insert(node.as_str()) && matches(name, node) {
                        seeds.push(node.clone());
                    }
                }
            }
        }

        seeds
    }

    /// Breadth-first walk over inheritance edges.
    ///
    /// `visit` is called once per newly reached role; returning `true` stops
    /// the walk early.
    fn walk<F>(&self, name: &str, domain: Option<&str>, mut visit: F)
    where
        F: FnMut(&str) -> bool,
    {
        let graphs = self.graphs(domain);
        if graphs.iter().all(|g| g.is_empty()) {
            return;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        for seed in self.seeds(name, &graphs) {
            if visited.insert(seed.clone()) {
                queue.push_back((seed, 0));
            }
        }

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= self.max_hierarchy_level {
                continue;
            }

            for graph in &graphs {
                let Some(parents) = graph.parents.get(&node) else {
                    continue;
                };

                for parent in parents {
                    if !visited.insert(parent.clone()) {
                        continue;
                    }
                    if visit(parent) {
                        return;
                    }
                    queue.push_back((parent.clone(), depth + 1));
                }
            }
        }
    }
}

impl Default for DefaultRoleManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HIERARCHY_LEVEL)
    }
}

impl RoleManager for DefaultRoleManager {
    fn add_link(&mut self, name1: &str, name2: &str, domain: Option<&str>) {
        if self.graph_mut(domain).add(name1, name2) {
            debug!("Role link added: {} -> {} (domain={:?})", name1, name2, domain);
        }
    }

    fn delete_link(&mut self, name1: &str, name2: &str, domain: Option<&str>) {
        let removed = match domain {
            None => self.default_graph.remove(name1, name2),
            Some(d) => match self.domains.get_mut(d) {
                Some(graph) => {
                    let removed = graph.remove(name1, name2);
                    if graph.is_empty() {
                        self.domains.remove(d);
                    }
                    removed
                }
                None => false,
            },
        };

        if removed {
            debug!("Role link deleted: {} -> {} (domain={:?})", name1, name2, domain);
        }
    }

    fn has_link(&self, name1: &str, name2: &str, domain: Option<&str>) -> bool {
        if self.name_matches(name1, name2) {
            return true;
        }

        let mut found = false;
        self.walk(name1, domain, |role| {
            found = self.name_matches(name2, role);
            found
        });
        found
    }

    fn get_roles(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        let mut roles: IndexSet<String> = IndexSet::new();
        for graph in self.graphs(domain) {
            if let Some(parents) = graph.parents.get(name) {
                roles.extend(parents.iter().cloned());
            }
        }
        roles.into_iter().collect()
    }

    fn get_users(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        let mut users: IndexSet<String> = IndexSet::new();
        for graph in self.graphs(domain) {
            if let Some(children) = graph.children.get(name) {
                users.extend(children.iter().cloned());
            }
        }
        users.into_iter().collect()
    }

    fn get_implicit_roles(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        let mut roles = Vec::new();
        self.walk(name, domain, |role| {
            if role != name {
                roles.push(role.to_string());
            }
            false
        });
        roles
    }

    fn clear(&mut self) {
        let edges: usize = self
            .domains
            .values()
            .chain(std::iter::once(&self.default_graph))
            .map(|g| g.parents.values().map(IndexSet::len).sum::<usize>())
            .sum();

        self.default_graph = DomainGraph::default();
        self.domains.clear();
        debug!("Role manager cleared ({} edges dropped)", edges);
    }
}

impl DefaultRoleManager {
    /// Number of distinct names known in `domain`
    pub fn node_count(&self, domain: Option<&str>) -> usize {
        let mut nodes: HashSet<&String> = HashSet::new();
        for graph in self.graphs(domain) {
            nodes.extend(graph.nodes());
        }
        nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{key_match, key_match2};

    #[test]
    fn test_transitive_link() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("alice", "admin", None);
        rm.add_link("admin", "root", None);

        assert!(rm.has_link("alice", "admin", None));
        assert!(rm.has_link("alice", "root", None));
        assert!(rm.has_link("admin", "root", None));
        assert!(!rm.has_link("root", "alice", None));
    }

    #[test]
    fn test_reflexive_link() {
        let rm = DefaultRoleManager::default();
        assert!(rm.has_link("alice", "alice", None));
        assert!(!rm.has_link("alice", "bob", None));
    }

    #[test]
    fn test_delete_link() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("alice", "admin", None);
        rm.add_link("admin", "root", None);

        rm.delete_link("admin", "root", None);
        assert!(!rm.has_link("alice", "root", None));
        assert!(rm.has_link("alice", "admin", None));

        // Deleting an absent edge is a no-op
        rm.delete_link("admin", "root", None);
        rm.delete_link("ghost", "nobody", Some("domain1"));
    }

    #[test]
    fn test_add_link_idempotent() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("alice", "admin", None);
        rm.add_link("alice", "admin", None);

        assert_eq!(rm.get_roles("alice", None), vec!["admin".to_string()]);
        assert_eq!(rm.get_users("admin", None), vec!["alice".to_string()]);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("a", "b", None);
        rm.add_link("b", "a", None);
        rm.add_link("b", "c", None);

        assert!(rm.has_link("a", "c", None));
        assert!(!rm.has_link("a", "d", None));
        assert_eq!(rm.get_implicit_roles("a", None), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_self_loop_terminates() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("a", "a", None);
        assert!(!rm.has_link("a", "b", None));
    }

    #[test]
    fn test_max_hierarchy_level() {
        let mut rm = DefaultRoleManager::new(10);
        for i in 0..12 {
            rm.add_link(&format!("r{}", i), &format!("r{}", i + 1), None);
        }

        assert!(rm.has_link("r0", "r10", None));
        assert!(!rm.has_link("r0", "r11", None));
        assert!(rm.has_link("r1", "r11", None));
    }

    #[test]
    fn test_direct_neighbors_only() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("alice", "admin", None);
        rm.add_link("bob", "admin", None);
        rm.add_link("admin", "root", None);

        assert_eq!(rm.get_roles("alice", None), vec!["admin".to_string()]);
        assert_eq!(
            rm.get_users("admin", None),
            vec!["alice".to_string(), "bob".to_string()]
        );
        assert_eq!(rm.get_users("root", None), vec!["admin".to_string()]);
        assert!(rm.get_roles("root", None).is_empty());
    }

    #[test]
    fn test_domains_are_isolated() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("alice", "admin", Some("domain1"));
        rm.add_link("bob", "admin", Some("domain2"));
        rm.add_link("carol", "admin", None);

        assert!(rm.has_link("alice", "admin", Some("domain1")));
        assert!(!rm.has_link("alice", "admin", Some("domain2")));
        assert!(!rm.has_link("alice", "admin", None));
        assert!(rm.has_link("bob", "admin", Some("domain2")));

        // Domain-less edges stay in the default domain
        assert!(rm.has_link("carol", "admin", None));
        assert!(!rm.has_link("carol", "admin", Some("domain1")));
    }

    #[test]
    fn test_domain_matching_fn() {
        let mut rm = DefaultRoleManager::default().with_domain_matching_fn(key_match);
        rm.add_link("alice", "admin", Some("*"));
        rm.add_link("bob", "admin", Some("domain1"));

        assert!(rm.has_link("alice", "admin", Some("domain1")));
        assert!(rm.has_link("alice", "admin", Some("domain2")));
        assert!(rm.has_link("bob", "admin", Some("domain1")));
        assert!(!rm.has_link("bob", "admin", Some("domain2")));
    }

    #[test]
    fn test_pattern_parent_names() {
        let mut rm = DefaultRoleManager::default().with_matching_fn(key_match2);
        rm.add_link("alice", "/book/:id", None);

        assert!(rm.has_link("alice", "/book/1", None));
        assert!(!rm.has_link("alice", "/pen/1", None));
    }

    #[test]
    fn test_pattern_member_names() {
        let mut rm = DefaultRoleManager::default().with_matching_fn(key_match2);
        rm.add_link("/book/:id", "book_group", None);
        rm.add_link("book_group", "library", None);

        assert!(rm.has_link("/book/1", "book_group", None));
        assert!(rm.has_link("/book/2", "library", None));
        assert!(!rm.has_link("/pen/1", "book_group", None));
    }

    #[test]
    fn test_clear() {
        let mut rm = DefaultRoleManager::default();
        rm.add_link("alice", "admin", None);
        rm.add_link("bob", "admin", Some("domain1"));
        assert_eq!(rm.node_count(None), 2);

        rm.clear();
        assert!(!rm.has_link("alice", "admin", None));
        assert!(!rm.has_link("bob", "admin", Some("domain1")));
        assert_eq!(rm.node_count(None), 0);
    }

    #[test]
    fn test_shared_role_manager() {
        let shared = DefaultRoleManager::default().into_shared();
        shared.write().add_link("alice", "admin", None);
        assert!(shared.read().has_link("alice", "admin", None));
    }
}
