//! Incremental policy mutation tests
//!
//! Add → update → remove → filtered remove → clear against the basic RBAC
//! model, checking decisions after every step.

use cretoai_enforcer::{DistributedEnforcer, Enforcer, EnforcerError, MemoryAdapter, Model};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rbac_model() -> Model {
    Model::builder()
        .request(["sub", "obj", "act"])
        .policy("p", ["sub", "obj", "act"])
        .role("g", 2)
        .matcher("g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
        .build()
        .unwrap()
}

fn rbac_policy() -> MemoryAdapter {
    MemoryAdapter::with_rules(vec![
        ("p", vec!["alice", "data1", "read"]),
        ("p", vec!["bob", "data2", "write"]),
        ("p", vec!["data2_admin", "data2", "read"]),
        ("p", vec!["data2_admin", "data2", "write"]),
        ("g", vec!["alice", "data2_admin"]),
    ])
}

async fn distributed_enforcer() -> DistributedEnforcer {
    let enforcer = Enforcer::builder(rbac_model())
        .adapter(rbac_policy())
        .build()
        .await
        .unwrap();
    DistributedEnforcer::new(enforcer)
}

fn check(e: &DistributedEnforcer, sub: &str, obj: &str, act: &str) -> bool {
    e.enforce(&[sub, obj, act]).unwrap()
}

// ============================================================================
// END-TO-END SCENARIO
// ============================================================================

#[tokio::test]
async fn test_distributed_rbac_scenario() {
    init_tracing();
    let e = distributed_enforcer().await;

    // Re-adding the loaded rules changes nothing
    let added = e
        .add_policies(
            "p",
            "p",
            &[
                ["alice", "data1", "read"],
                ["bob", "data2", "write"],
                ["data2_admin", "data2", "read"],
                ["data2_admin", "data2", "write"],
            ],
        )
        .unwrap();
    assert!(added.is_empty());
    assert!(e.add_policies("g", "g", &[["alice", "data2_admin"]]).unwrap().is_empty());

    assert!(check(&e, "alice", "data1", "read"));
    assert!(!check(&e, "alice", "data1", "write"));
    assert!(check(&e, "bob", "data2", "write"));
    assert!(!check(&e, "bob", "data2", "read"));
    assert!(check(&e, "data2_admin", "data2", "read"));
    assert!(check(&e, "data2_admin", "data2", "write"));
    assert!(check(&e, "alice", "data2", "read"));
    assert!(check(&e, "alice", "data2", "write"));

    // Update
    e.update_policy("p", "p", &["alice", "data1", "read"], &["alice", "data1", "write"])
        .unwrap();
    e.update_policy("g", "g", &["alice", "data2_admin"], &["tom", "alice"])
        .unwrap();

    assert!(!check(&e, "alice", "data1", "read"));
    assert!(check(&e, "alice", "data1", "write"));
    assert!(!check(&e, "bob", "data2", "read"));
    assert!(check(&e, "bob", "data2", "write"));
    assert!(check(&e, "data2_admin", "data2", "read"));
    assert!(check(&e, "data2_admin", "data2", "write"));
    assert!(!check(&e, "tom", "data1", "read"));
    assert!(check(&e, "tom", "data1", "write"));

    // Remove
    let removed = e.remove_policies("p", "p", &[["alice", "data1", "write"]]).unwrap();
    assert_eq!(removed.len(), 1);

    assert!(!check(&e, "alice", "data1", "read"));
    assert!(!check(&e, "alice", "data1", "write"));
    assert!(!check(&e, "bob", "data2", "read"));
    assert!(check(&e, "bob", "data2", "write"));
    assert!(check(&e, "data2_admin", "data2", "read"));
    assert!(check(&e, "data2_admin", "data2", "write"));
    assert!(!check(&e, "alice", "data2", "read"));
    assert!(!check(&e, "alice", "data2", "write"));

    // Filtered remove; the grouping filter matches nothing
    let removed = e
        .remove_filtered_policy("p", "p", 0, &["bob", "data2", "write"])
        .unwrap();
    assert_eq!(removed.len(), 1);
    let removed = e
        .remove_filtered_policy("g", "g", 0, &["tom", "data2_admin"])
        .unwrap();
    assert!(removed.is_empty());

    assert!(!check(&e, "alice", "data1", "read"));
    assert!(!check(&e, "alice", "data1", "write"));
    assert!(!check(&e, "bob", "data2", "read"));
    assert!(!check(&e, "bob", "data2", "write"));
    assert!(check(&e, "data2_admin", "data2", "read"));
    assert!(check(&e, "data2_admin", "data2", "write"));
    assert!(!check(&e, "tom", "data1", "read"));
    assert!(!check(&e, "tom", "data1", "write"));

    // Clear
    e.clear_policy();

    assert!(!check(&e, "alice", "data1", "read"));
    assert!(!check(&e, "alice", "data1", "write"));
    assert!(!check(&e, "bob", "data2", "read"));
    assert!(!check(&e, "bob", "data2", "write"));
    assert!(!check(&e, "data2_admin", "data2", "read"));
    assert!(!check(&e, "data2_admin", "data2", "write"));
}

// ============================================================================
// MUTATION SEMANTICS
// ============================================================================

#[tokio::test]
async fn test_update_missing_rule_fails() {
    let e = distributed_enforcer().await;

    let result = e.update_policy(
        "p",
        "p",
        &["carol", "data1", "read"],
        &["carol", "data1", "write"],
    );
    assert!(matches!(result, Err(EnforcerError::PolicyNotFound(rule)) if rule[0] == "carol"));
    assert_eq!(e.get_policy().len(), 4);
}

#[tokio::test]
async fn test_update_onto_existing_rule_fails() {
    let e = distributed_enforcer().await;

    let result = e.update_policy("p", "p", &["alice", "data1", "read"], &["bob", "data2", "write"]);
    assert!(matches!(result, Err(EnforcerError::PolicyExists(_))));
    assert!(check(&e, "alice", "data1", "read"));
}

#[tokio::test]
async fn test_batch_update_with_repeated_old_rule_fails() {
    let e = distributed_enforcer().await;

    let result = e.update_policies(
        "g",
        "g",
        &[["alice", "data2_admin"], ["alice", "data2_admin"]],
        &[["bob", "data2_admin"], ["carol", "data2_admin"]],
    );
    assert!(matches!(result, Err(EnforcerError::InvalidRule(_))));

    assert_eq!(e.get_grouping_policy(), vec![vec!["alice", "data2_admin"]]);
    assert!(!check(&e, "bob", "data2", "read"));
    assert!(!check(&e, "carol", "data2", "read"));
    assert!(check(&e, "alice", "data2", "read"));
}

#[tokio::test]
async fn test_batch_grouping_update_moves_links() {
    let e = distributed_enforcer().await;
    e.add_policy("g", "g", &["bob", "data2_admin"]).unwrap();

    e.update_policies(
        "g",
        "g",
        &[["alice", "data2_admin"], ["bob", "data2_admin"]],
        &[["carol", "data2_admin"], ["dave", "data2_admin"]],
    )
    .unwrap();

    assert_eq!(
        e.get_grouping_policy(),
        vec![vec!["carol", "data2_admin"], vec!["dave", "data2_admin"]]
    );
    assert_eq!(e.get_users_for_role("data2_admin", None), vec!["carol", "dave"]);
    assert!(check(&e, "carol", "data2", "read"));
    assert!(check(&e, "dave", "data2", "write"));
    assert!(!check(&e, "alice", "data2", "read"));
    assert!(!check(&e, "bob", "data2", "read"));
}

#[tokio::test]
async fn test_update_preserves_order() {
    let e = distributed_enforcer().await;

    e.update_policy("p", "p", &["bob", "data2", "write"], &["bob", "data3", "write"])
        .unwrap();

    let rules = e.get_policy();
    assert_eq!(rules[1], vec!["bob", "data3", "write"]);
    assert_eq!(rules.len(), 4);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let e = distributed_enforcer().await;

    assert!(e.remove_policy("g", "g", &["alice", "data2_admin"]).unwrap());
    assert!(!e.remove_policy("g", "g", &["alice", "data2_admin"]).unwrap());
    assert!(!e.has_role_for_user("alice", "data2_admin", None));
}

#[tokio::test]
async fn test_filtered_remove_with_wildcards() {
    let e = distributed_enforcer().await;

    let removed = e.remove_filtered_policy("p", "p", 1, &["data2", ""]).unwrap();
    assert_eq!(removed.len(), 3);
    assert_eq!(e.get_policy(), vec![vec!["alice", "data1", "read"]]);
}

#[tokio::test]
async fn test_unknown_section_rejected() {
    let e = distributed_enforcer().await;

    assert!(matches!(
        e.add_policy("q", "p", &["alice", "data1", "read"]),
        Err(EnforcerError::UnknownPolicyType { .. })
    ));
    assert!(matches!(
        e.remove_filtered_policy("g", "g2", 0, &["alice"]),
        Err(EnforcerError::UnknownPolicyType { .. })
    ));
}

#[tokio::test]
async fn test_save_after_mutations() -> anyhow::Result<()> {
    init_tracing();
    let adapter = rbac_policy();
    let enforcer = Enforcer::builder(rbac_model())
        .adapter(adapter.clone())
        .build()
        .await?;
    let e = DistributedEnforcer::new(enforcer);

    e.add_policy("p", "p", &["carol", "data3", "read"])?;
    e.remove_policy("g", "g", &["alice", "data2_admin"])?;
    e.save_policy().await?;

    let stored = adapter.rules().await;
    assert_eq!(stored.len(), 5);
    assert!(stored.iter().all(|(ptype, _)| ptype == "p"));

    // A fresh enforcer over the same store sees the saved state
    let reloaded = Enforcer::builder(rbac_model()).adapter(adapter).build().await?;
    assert!(reloaded.enforce(&["carol", "data3", "read"])?);
    assert!(!reloaded.enforce(&["alice", "data2", "read"])?);
    Ok(())
}
