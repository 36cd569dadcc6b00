//! Policy storage seam
//!
//! The enforcer only needs a full load and a full save; incremental
//! persistence and change notification are left to the embedder.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::policy::Rule;

/// Policy store trait
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Load every stored `(ptype, rule)` pair
    async fn load_policy(&self) -> Result<Vec<(String, Rule)>>;

    /// Replace the stored policy with `rules`
    async fn save_policy(&self, rules: Vec<(String, Rule)>) -> Result<()>;
}

/// In-memory adapter implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    rules: Arc<RwLock<Vec<(String, Rule)>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with rules before handing the adapter to an enforcer
    pub fn with_rules<I, R, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, R)>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(ptype, rule)| (ptype.into(), rule.into_iter().map(Into::into).collect()))
            .collect();

        Self {
            rules: Arc::new(RwLock::new(rules)),
        }
    }

    /// Currently stored rules
    pub async fn rules(&self) -> Vec<(String, Rule)> {
        self.rules.read().await.clone()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn load_policy(&self) -> Result<Vec<(String, Rule)>> {
        let rules = self.rules.read().await;
        Ok(rules.clone())
    }

    async fn save_policy(&self, rules: Vec<(String, Rule)>) -> Result<()> {
        let mut stored = self.rules.write().await;
        *stored = rules;
        Ok(())
    }
}
