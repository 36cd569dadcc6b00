//! Incremental policy mutations
//!
//! [`DistributedEnforcer`] applies section-scoped changes pushed from a
//! coordinator without a full reload. Every mutation validates its input,
//! then takes the policy write lock followed by the affected role manager's
//! write lock, so concurrent decisions observe either the whole pre-state or
//! the whole post-state.

use std::collections::HashSet;
use std::ops::Deref;
use tracing::{debug, info};

use super::{link_rule, to_rule, unlink_rule, Enforcer};
use crate::error::{EnforcerError, Result};
use crate::model::{POLICY_SECTION, ROLE_SECTION};
use crate::policy::Rule;

/// Enforcer accepting incremental policy updates
///
/// # Example
///
/// ```
/// use cretoai_enforcer::{DistributedEnforcer, Enforcer, Model};
///
/// let model = Model::builder()
///     .request(["sub", "obj", "act"])
///     .policy("p", ["sub", "obj", "act"])
///     .role("g", 2)
///     .matcher("g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
///     .build()
///     .unwrap();
/// let enforcer = DistributedEnforcer::new(Enforcer::new(model).unwrap());
///
/// enforcer.add_policy("p", "p", &["admin", "data1", "read"]).unwrap();
/// enforcer.add_policy("g", "g", &["alice", "admin"]).unwrap();
/// assert!(enforcer.enforce(&["alice", "data1", "read"]).unwrap());
///
/// enforcer.remove_policy("g", "g", &["alice", "admin"]).unwrap();
/// assert!(!enforcer.enforce(&["alice", "data1", "read"]).unwrap());
/// ```
#[derive(Debug)]
pub struct DistributedEnforcer {
    inner: Enforcer,
}

impl DistributedEnforcer {
    pub fn new(enforcer: Enforcer) -> Self {
        Self { inner: enforcer }
    }

    pub fn into_inner(self) -> Enforcer {
        self.inner
    }

    /// Add one rule if absent. Returns whether it was inserted.
    pub fn add_policy<S: AsRef<str>>(&self, sec: &str, ptype: &str, rule: &[S]) -> Result<bool> {
        let added = self.add_policies(sec, ptype, &[rule])?;
        Ok(!added.is_empty())
    }

    /// Add every absent rule, returning the rules actually inserted
    pub fn add_policies<R, S>(&self, sec: &str, ptype: &str, rules: &[R]) -> Result<Vec<Rule>>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let rules = self.checked_rules(sec, ptype, rules)?;

        let mut policy = self.inner.policy.write();
        let added = policy.add_all(ptype, &rules);

        if sec == ROLE_SECTION && !added.is_empty() {
            if let Some(rm) = self.inner.role_managers.get(ptype) {
                let mut rm = rm.write();
                for rule in &added {
                    link_rule(&mut *rm, rule);
                }
            }
        }

        debug!("Added {} of {} {} rules", added.len(), rules.len(), ptype);
        Ok(added)
    }

    /// Replace `old` with `new` in place
    ///
    /// # Errors
    ///
    /// [`EnforcerError::PolicyNotFound`] if `old` is absent and
    /// [`EnforcerError::PolicyExists`] if a different `new` is already
    /// present. Nothing changes on error.
    pub fn update_policy<S: AsRef<str>>(
        &self,
        sec: &str,
        ptype: &str,
        old: &[S],
        new: &[S],
    ) -> Result<()> {
        self.update_policies(sec, ptype, &[old], &[new])
    }

    /// Replace each `olds[i]` with `news[i]` atomically
    ///
    /// # Errors
    ///
    /// [`EnforcerError::InvalidRule`] if the batches differ in length or a
    /// rule appears twice among `olds`, plus the errors of
    /// [`update_policy`](Self::update_policy). Nothing changes on error.
    pub fn update_policies<R, S>(
        &self,
        sec: &str,
        ptype: &str,
        olds: &[R],
        news: &[R],
    ) -> Result<()>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        if olds.len() != news.len() {
            return Err(EnforcerError::InvalidRule(format!(
                "update of {} rules with {} replacements",
                olds.len(),
                news.len()
            )));
        }

        let olds = self.checked_rules(sec, ptype, olds)?;
        let news = self.checked_rules(sec, ptype, news)?;

        let mut replaced: HashSet<&Rule> = HashSet::new();
        for old in &olds {
            if !replaced.insert(old) {
                return Err(EnforcerError::InvalidRule(format!(
                    "rule {:?} replaced more than once",
                    old
                )));
            }
        }

        let mut policy = self.inner.policy.write();

        for old in &olds {
            if !policy.contains(ptype, old) {
                return Err(EnforcerError::PolicyNotFound(old.clone()));
            }
        }

        let mut incoming: HashSet<&Rule> = HashSet::new();
        for (old, new) in olds.iter().zip(&news) {
            let taken = old != new && policy.contains(ptype, new) && !replaced.contains(new);
            if taken || !incoming.insert(new) {
                return Err(EnforcerError::PolicyExists(new.clone()));
            }
        }

        let pairs: Vec<(Rule, Rule)> = olds.iter().cloned().zip(news.iter().cloned()).collect();
        policy.replace_all(ptype, &pairs);

        if sec == ROLE_SECTION {
            if let Some(rm) = self.inner.role_managers.get(ptype) {
                let mut rm = rm.write();
                for old in &olds {
                    unlink_rule(&mut *rm, old);
                }
                for new in &news {
                    link_rule(&mut *rm, new);
                }
            }
        }

        debug!("Updated {} {} rules", pairs.len(), ptype);
        Ok(())
    }

    /// Remove one rule if present. Returns whether it was removed.
    pub fn remove_policy<S: AsRef<str>>(&self, sec: &str, ptype: &str, rule: &[S]) -> Result<bool> {
        let removed = self.remove_policies(sec, ptype, &[rule])?;
        Ok(!removed.is_empty())
    }

    /// Remove every present rule, returning the rules actually removed
    pub fn remove_policies<R, S>(&self, sec: &str, ptype: &str, rules: &[R]) -> Result<Vec<Rule>>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let rules = self.checked_rules(sec, ptype, rules)?;

        let mut policy = self.inner.policy.write();
        let removed: Vec<Rule> = rules
            .into_iter()
            .filter(|rule| policy.remove(ptype, rule))
            .collect();

        self.unlink_removed(sec, ptype, &removed);

        debug!("Removed {} {} rules", removed.len(), ptype);
        Ok(removed)
    }

    /// Remove every rule whose fields from `field_index` on equal `values`;
    /// an empty value matches any field. Returns the removed rules.
    pub fn remove_filtered_policy<S: AsRef<str>>(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        values: &[S],
    ) -> Result<Vec<Rule>> {
        let arity = self.checked_section(sec, ptype)?;
        let end = field_index.checked_add(values.len());
        if end.map_or(true, |end| end > arity) {
            return Err(EnforcerError::InvalidRule(format!(
                "filter at field {} with {} values exceeds {} arity {}",
                field_index,
                values.len(),
                ptype,
                arity
            )));
        }
        let values = to_rule(values);

        let mut policy = self.inner.policy.write();
        let removed = policy.remove_filtered(ptype, field_index, &values);

        self.unlink_removed(sec, ptype, &removed);

        debug!(
            "Removed {} {} rules matching {:?} at field {}",
            removed.len(),
            ptype,
            values,
            field_index
        );
        Ok(removed)
    }

    /// Drop every rule of every section and every role link
    pub fn clear_policy(&self) {
        let mut policy = self.inner.policy.write();
        policy.clear();
        for rm in self.inner.role_managers.values() {
            rm.write().clear();
        }
        info!("Policy cleared");
    }

    /// Called with the policy write lock held
    fn unlink_removed(&self, sec: &str, ptype: &str, removed: &[Rule]) {
        if sec != ROLE_SECTION || removed.is_empty() {
            return;
        }
        if let Some(rm) = self.inner.role_managers.get(ptype) {
            let mut rm = rm.write();
            for rule in removed {
                unlink_rule(&mut *rm, rule);
            }
        }
    }

    /// Arity of a declared section/ptype pair
    fn checked_section(&self, sec: &str, ptype: &str) -> Result<usize> {
        if sec != POLICY_SECTION && sec != ROLE_SECTION {
            return Err(EnforcerError::UnknownPolicyType {
                section: sec.to_string(),
                ptype: ptype.to_string(),
            });
        }
        self.inner.model.arity(sec, ptype)
    }

    /// Convert and validate a batch before any mutation
    fn checked_rules<R, S>(&self, sec: &str, ptype: &str, rules: &[R]) -> Result<Vec<Rule>>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        self.checked_section(sec, ptype)?;
        rules
            .iter()
            .map(|rule| {
                let rule = to_rule(rule.as_ref());
                self.inner.check_rule(sec, ptype, &rule)?;
                Ok(rule)
            })
            .collect()
    }
}

impl Deref for DistributedEnforcer {
    type Target = Enforcer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<Enforcer> for DistributedEnforcer {
    fn from(enforcer: Enforcer) -> Self {
        Self::new(enforcer)
    }
}
