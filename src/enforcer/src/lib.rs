//! # CretoAI Policy Enforcer
//!
//! Model-driven RBAC/ABAC enforcer: a declarative model, a set of policy
//! rules and a request tuple go in, an allow/deny decision comes out.
//!
//! ## Features
//!
//! - **Matcher library** with path, regex, glob, IP and templated-token matching
//! - **Role graph** with domains, pattern role names and depth-bounded traversal
//! - **Matcher expressions** compiled once with CEL (Common Expression Language)
//! - **Effect policies**: allow-override, deny-override, priority, unique
//! - **Incremental updates** through [`DistributedEnforcer`]
//! - **Async policy adapters** for loading and saving rules
//!
//! ## Example
//!
//! ```rust
//! use cretoai_enforcer::{Enforcer, MemoryAdapter, Model};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = Model::builder()
//!         .request(["sub", "obj", "act"])
//!         .policy("p", ["sub", "obj", "act"])
//!         .role("g", 2)
//!         .matcher("g(r.sub, p.sub) && keyMatch2(r.obj, p.obj) && r.act == p.act")
//!         .build()?;
//!
//!     let adapter = MemoryAdapter::with_rules(vec![
//!         ("p", vec!["reader", "/books/:id", "GET"]),
//!         ("g", vec!["alice", "reader"]),
//!     ]);
//!
//!     let enforcer = Enforcer::builder(model).adapter(adapter).build().await?;
//!
//!     if enforcer.enforce(&["alice", "/books/42", "GET"])? {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod cel;
pub mod effector;
pub mod enforcer;
pub mod error;
pub mod matchers;
pub mod model;
pub mod policy;
pub mod rbac;

// Re-export commonly used types
pub use adapter::{Adapter, MemoryAdapter};
pub use effector::{Effect, EffectPolicy};
pub use enforcer::{
    Decision, DecisionReason, DistributedEnforcer, Enforcer, EnforcerBuilder, EnforcerConfig,
};
pub use error::{EnforcerError, Result};
pub use matchers::{FunctionRegistry, MatchError};
pub use model::{Model, ModelBuilder};
pub use policy::{PolicySet, Rule};
pub use rbac::{DefaultRoleManager, RoleManager, SharedRoleManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
