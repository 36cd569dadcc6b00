//! Authorization decision types

use serde::{Deserialize, Serialize};

use crate::effector::EffectPolicy;
use crate::policy::Rule;

/// Authorization decision with explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Rule that decided, if a single rule did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,

    /// Reason for the decision
    pub reason: DecisionReason,
}

impl Decision {
    /// Decision made by a specific rule
    pub fn matched(allowed: bool, rule: Rule) -> Self {
        Self {
            allowed,
            rule: Some(rule),
            reason: DecisionReason::RuleMatch,
        }
    }

    /// Decision reached by combining effects without a single deciding rule
    pub fn combined(allowed: bool, effect: EffectPolicy) -> Self {
        Self {
            allowed,
            rule: None,
            reason: DecisionReason::Combined { effect },
        }
    }

    /// No rule was satisfied
    pub fn default_for(effect: EffectPolicy) -> Self {
        Self {
            allowed: effect.default_decision(),
            rule: None,
            reason: DecisionReason::DefaultDecision { effect },
        }
    }
}

/// Reason for authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecisionReason {
    /// A single satisfied rule decided
    RuleMatch,

    /// Satisfied rules were combined without a single deciding rule
    Combined { effect: EffectPolicy },

    /// No rule was satisfied; the effect policy default applies
    DefaultDecision { effect: EffectPolicy },
}
