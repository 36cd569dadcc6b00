//! Effect combination
//!
//! Satisfied rules are pushed one at a time into an [`EffectStream`], which
//! reports when the final decision can no longer change so the enforcer can
//! stop evaluating rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EnforcerError;

/// Effect carried by a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
    /// Any `eft` value other than allow/deny; never decides on its own
    Indeterminate,
}

impl Effect {
    /// Interpret a rule's `eft` field
    pub fn from_field(value: &str) -> Self {
        match value {
            "allow" => Effect::Allow,
            "deny" => Effect::Deny,
            _ => Effect::Indeterminate,
        }
    }
}

/// How satisfied rule effects are combined into one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum EffectPolicy {
    /// Allow if any satisfied rule allows and none denies
    #[default]
    AllowOverride,
    /// Allow unless a satisfied rule denies
    DenyOverride,
    /// First satisfied allow/deny rule in priority order decides
    Priority,
    /// Allow only if exactly one rule is satisfied and it allows
    Unique,
}

impl EffectPolicy {
    /// Decision when no rule is satisfied
    pub fn default_decision(self) -> bool {
        matches!(self, EffectPolicy::DenyOverride)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EffectPolicy::AllowOverride => "allow-override",
            EffectPolicy::DenyOverride => "deny-override",
            EffectPolicy::Priority => "priority",
            EffectPolicy::Unique => "unique",
        }
    }
}

impl fmt::Display for EffectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectPolicy {
    type Err = EnforcerError;

    /// Accepts the short identifiers as well as the classic effect expressions
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| !c.is_whitespace()).collect();

        match normalized.as_str() {
            "allow-override" | "some(where(p.eft==allow))" => Ok(EffectPolicy::AllowOverride),
            "some(where(p.eft==allow))&&!some(where(p.eft==deny))" => {
                Ok(EffectPolicy::AllowOverride)
            }
            "deny-override" | "!some(where(p.eft==deny))" => Ok(EffectPolicy::DenyOverride),
            "priority" | "priority(p.eft)||deny" => Ok(EffectPolicy::Priority),
            "unique" => Ok(EffectPolicy::Unique),
            _ => Err(EnforcerError::InvalidModel(format!(
                "unsupported effect policy: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for EffectPolicy {
    type Error = EnforcerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Incremental combiner for one decision
#[derive(Debug, Clone)]
pub struct EffectStream {
    policy: EffectPolicy,
    /// Decision fixed by a short-circuit
    decided: Option<bool>,
    /// Rule index responsible for the decision
    explain: Option<usize>,
    first_allow: Option<usize>,
    satisfied: usize,
}

impl EffectStream {
    pub fn new(policy: EffectPolicy) -> Self {
        Self {
            policy,
            decided: None,
            explain: None,
            first_allow: None,
            satisfied: 0,
        }
    }

    /// Push the effect of a satisfied rule.
    ///
    /// Returns `true` once the decision is final and further rules need not
    /// be evaluated.
    pub fn push(&mut self, effect: Effect, index: usize) -> bool {
        if self.decided.is_some() {
            return true;
        }

        self.satisfied += 1;

        match self.policy {
            EffectPolicy::AllowOverride | EffectPolicy::DenyOverride => match effect {
                Effect::Deny => self.decide(false, Some(index)),
                Effect::Allow => {
                    self.first_allow.get_or_insert(index);
                }
                Effect::Indeterminate => {}
            },
            EffectPolicy::Priority => match effect {
                Effect::Allow => self.decide(true, Some(index)),
                Effect::Deny => self.decide(false, Some(index)),
                Effect::Indeterminate => {}
            },
            EffectPolicy::Unique => {
                if self.satisfied > 1 {
                    self.decide(false, None);
                } else if effect == Effect::Allow {
                    self.first_allow = Some(index);
                }
            }
        }

        self.decided.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.decided.is_some()
    }

    /// Final decision and the index of the deciding rule, if any
    pub fn finish(self) -> (bool, Option<usize>) {
        if let Some(allowed) = self.decided {
            return (allowed, self.explain);
        }

        match self.policy {
            EffectPolicy::AllowOverride | EffectPolicy::Unique => match self.first_allow {
                Some(index) => (true, Some(index)),
                None => (self.policy.default_decision(), None),
            },
            EffectPolicy::DenyOverride => (true, self.first_allow),
            EffectPolicy::Priority => (self.policy.default_decision(), None),
        }
    }

    fn decide(&mut self, allowed: bool, index: Option<usize>) {
        self.decided = Some(allowed);
        self.explain = index;
    }
}

/// Combine per-rule outcomes in one call.
///
/// `outcomes[i]` is `(satisfied, effect)` for rule `i`.
pub fn merge_effects(policy: EffectPolicy, outcomes: &[(bool, Effect)]) -> (bool, Option<usize>) {
    let mut stream = EffectStream::new(policy);
    for (index, (satisfied, effect)) in outcomes.iter().enumerate() {
        if *satisfied && stream.push(*effect, index) {
            break;
        }
    }
    stream.finish()
}
