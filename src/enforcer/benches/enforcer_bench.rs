//! Enforcer benchmarks
//!
//! Decision latency against growing rule sets, and role graph reachability
//! across deep hierarchies.

use cretoai_enforcer::{
    rbac::{DefaultRoleManager, RoleManager},
    Enforcer, EnforcerConfig, MemoryAdapter, Model,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

fn rbac_model() -> Model {
    Model::builder()
        .request(["sub", "obj", "act"])
        .policy("p", ["sub", "obj", "act"])
        .role("g", 2)
        .matcher("g(r.sub, p.sub) && keyMatch2(r.obj, p.obj) && r.act == p.act")
        .build()
        .unwrap()
}

fn create_test_rules(count: usize) -> Vec<(String, Vec<String>)> {
    let mut rules: Vec<(String, Vec<String>)> = (0..count)
        .map(|i| {
            (
                "p".to_string(),
                vec![
                    format!("role-{}", i % 10),
                    format!("/data/{}/:id", i),
                    "read".to_string(),
                ],
            )
        })
        .collect();

    rules.extend((0..100).map(|i| {
        (
            "g".to_string(),
            vec![format!("user-{}", i), format!("role-{}", i % 10)],
        )
    }));
    rules
}

fn bench_enforce(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("enforce");

    for rule_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rules", rule_count),
            rule_count,
            |b, &count| {
                let enforcer = rt.block_on(async {
                    Enforcer::builder(rbac_model())
                        .config(EnforcerConfig {
                            enable_explain: false,
                            ..Default::default()
                        })
                        .adapter(MemoryAdapter::with_rules(create_test_rules(count)))
                        .build()
                        .await
                        .unwrap()
                });

                let last = format!("/data/{}/42", count - 1);
                b.iter(|| {
                    black_box(
                        enforcer
                            .enforce(&["user-9", last.as_str(), "read"])
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_has_link(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_link");

    for depth in [2usize, 5, 10].iter() {
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, &depth| {
            let mut rm = DefaultRoleManager::new(depth + 1);
            for i in 0..depth {
                rm.add_link(&format!("r{}", i), &format!("r{}", i + 1), None);
                // Fan-out the BFS has to skip
                for j in 0..5 {
                    rm.add_link(&format!("r{}", i), &format!("side-{}-{}", i, j), None);
                }
            }

            let target = format!("r{}", depth);
            b.iter(|| black_box(rm.has_link("r0", &target, None)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enforce, bench_has_link);
criterion_main!(benches);
