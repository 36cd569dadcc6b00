//! Property tests for matchers, the role graph and policy mutations

use cretoai_enforcer::{
    matchers::{ip_match, key_match, key_match2, regex_match},
    rbac::{DefaultRoleManager, RoleManager},
    DistributedEnforcer, Enforcer, Model,
};
use proptest::prelude::*;

fn rbac_enforcer() -> DistributedEnforcer {
    let model = Model::builder()
        .request(["sub", "obj", "act"])
        .policy("p", ["sub", "obj", "act"])
        .role("g", 2)
        .matcher("g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
        .build()
        .unwrap();
    DistributedEnforcer::new(Enforcer::new(model).unwrap())
}

proptest! {
    #[test]
    fn test_key_match_literal_is_reflexive(path in "/[a-z0-9/]{0,20}") {
        prop_assert!(key_match(&path, &path));
        prop_assert!(key_match2(&path, &path));
    }

    #[test]
    fn test_key_match_prefix_wildcard(prefix in "/[a-z]{1,8}/", suffix in "[a-z0-9/]{0,12}") {
        let pattern = format!("{}*", prefix);
        let candidate = format!("{}{}", prefix, suffix);
        prop_assert!(key_match(&candidate, &pattern));
    }

    #[test]
    fn test_ip_match_never_panics(ip1 in "\\PC{0,20}", ip2 in "\\PC{0,20}") {
        let _ = ip_match(&ip1, &ip2);
        prop_assert!(ip_match(&ip1, &ip1));
    }

    #[test]
    fn test_regex_match_never_panics(key in "\\PC{0,20}", pattern in "\\PC{0,10}") {
        let _ = regex_match(&key, &pattern);
    }

    #[test]
    fn test_role_graph_terminates_on_random_edges(
        edges in prop::collection::vec((0u8..12, 0u8..12), 0..60),
        query in (0u8..12, 0u8..12),
    ) {
        let mut rm = DefaultRoleManager::new(10);
        for (child, parent) in &edges {
            rm.add_link(&format!("n{}", child), &format!("n{}", parent), None);
        }

        let (from, to) = query;
        let from = format!("n{}", from);
        let to = format!("n{}", to);

        let reachable = rm.has_link(&from, &to, None);
        let implicit = rm.get_implicit_roles(&from, None);
        prop_assert_eq!(reachable, from == to || implicit.contains(&to));
    }

    #[test]
    fn test_add_then_remove_restores_decision(
        sub in "[a-z]{3,8}",
        obj in "[a-z]{3,8}",
        act in "(read|write)",
    ) {
        let e = rbac_enforcer();
        let before = e.enforce(&[sub.as_str(), obj.as_str(), act.as_str()]).unwrap();

        prop_assert!(e.add_policy("p", "p", &[sub.as_str(), obj.as_str(), act.as_str()]).unwrap());
        prop_assert!(e.enforce(&[sub.as_str(), obj.as_str(), act.as_str()]).unwrap());

        let removed = e.remove_policy("p", "p", &[sub.as_str(), obj.as_str(), act.as_str()]);
        prop_assert!(removed.unwrap());
        prop_assert_eq!(e.enforce(&[sub.as_str(), obj.as_str(), act.as_str()]).unwrap(), before);
    }
}
