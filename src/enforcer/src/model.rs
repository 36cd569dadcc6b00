//! Access-control model
//!
//! A model declares the request shape (`r`), one or more policy rule shapes
//! (`p`, `p2`, ...), the grouping relations (`g`, `g2`, ...), how rule
//! effects are combined, and the matcher expression. It is built with
//! [`ModelBuilder`] or deserialized from any serde format.
//!
//! ```
//! use cretoai_enforcer::{EffectPolicy, Model};
//!
//! let model = Model::builder()
//!     .request(["sub", "obj", "act"])
//!     .policy("p", ["sub", "obj", "act"])
//!     .role("g", 2)
//!     .effect(EffectPolicy::AllowOverride)
//!     .matcher("g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(model.primary_policy_type(), "p");
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::effector::EffectPolicy;
use crate::error::{EnforcerError, Result};

/// Section holding permission rules
pub const POLICY_SECTION: &str = "p";

/// Section holding grouping (role assignment) rules
pub const ROLE_SECTION: &str = "g";

/// Rule field carrying the rule effect
pub const EFFECT_FIELD: &str = "eft";

/// Rule field carrying the rule priority
pub const PRIORITY_FIELD: &str = "priority";

/// Declarative access-control model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Request field names, bound as `r.<field>`
    request: Vec<String>,

    /// Policy type -> rule field names, bound as `p.<field>`
    policies: IndexMap<String, Vec<String>>,

    /// Grouping type -> rule arity (2, or 3 with a domain)
    #[serde(default)]
    roles: IndexMap<String, usize>,

    /// Effect combination policy
    #[serde(default)]
    effect: EffectPolicy,

    /// Matcher expression
    matcher: String,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Parse and validate a JSON model definition
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Model = serde_json::from_str(json)
            .map_err(|e| EnforcerError::InvalidModel(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    /// Check the model is complete and internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.request.is_empty() {
            return Err(EnforcerError::InvalidModel(
                "request definition has no fields".to_string(),
            ));
        }
        check_fields("request", &self.request)?;

        if self.policies.is_empty() {
            return Err(EnforcerError::InvalidModel(
                "at least one policy definition is required".to_string(),
            ));
        }
        for (ptype, fields) in &self.policies {
            check_type_name(ptype, POLICY_SECTION)?;
            if fields.is_empty() {
                return Err(EnforcerError::InvalidModel(format!(
                    "policy definition '{}' has no fields",
                    ptype
                )));
            }
            check_fields(ptype, fields)?;
        }

        for (ptype, arity) in &self.roles {
            check_type_name(ptype, ROLE_SECTION)?;
            if !(2..=3).contains(arity) {
                return Err(EnforcerError::InvalidModel(format!(
                    "grouping definition '{}' must have 2 or 3 fields, got {}",
                    ptype, arity
                )));
            }
        }

        if self.matcher.trim().is_empty() {
            return Err(EnforcerError::InvalidModel("matcher is empty".to_string()));
        }

        Ok(())
    }

    pub fn request_tokens(&self) -> &[String] {
        &self.request
    }

    /// Field names of a policy type
    pub fn policy_tokens(&self, ptype: &str) -> Option<&[String]> {
        self.policies.get(ptype).map(Vec::as_slice)
    }

    /// Policy type the matcher is evaluated against (the first declared)
    pub fn primary_policy_type(&self) -> &str {
        self.policies
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or(POLICY_SECTION)
    }

    pub fn policy_types(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn role_types(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    pub fn role_arity(&self, ptype: &str) -> Option<usize> {
        self.roles.get(ptype).copied()
    }

    pub fn effect(&self) -> EffectPolicy {
        self.effect
    }

    pub fn matcher(&self) -> &str {
        &self.matcher
    }

    /// Position of a named field within a policy type
    pub fn field_index(&self, ptype: &str, field: &str) -> Option<usize> {
        self.policies.get(ptype)?.iter().position(|f| f == field)
    }

    /// Rule arity for a section/ptype pair
    ///
    /// # Errors
    ///
    /// [`EnforcerError::UnknownPolicyType`] if the pair is not declared.
    pub fn arity(&self, section: &str, ptype: &str) -> Result<usize> {
        let arity = match section {
            POLICY_SECTION => self.policies.get(ptype).map(Vec::len),
            ROLE_SECTION => self.roles.get(ptype).copied(),
            _ => None,
        };

        arity.ok_or_else(|| EnforcerError::UnknownPolicyType {
            section: section.to_string(),
            ptype: ptype.to_string(),
        })
    }

    /// Section a ptype belongs to, if declared
    pub fn section_of(&self, ptype: &str) -> Option<&'static str> {
        if self.policies.contains_key(ptype) {
            Some(POLICY_SECTION)
        } else if self.roles.contains_key(ptype) {
            Some(ROLE_SECTION)
        } else {
            None
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_type_name(ptype: &str, section: &str) -> Result<()> {
    if !ptype.starts_with(section) || !is_identifier(ptype) {
        return Err(EnforcerError::InvalidModel(format!(
            "'{}' is not a valid '{}' section type",
            ptype, section
        )));
    }
    Ok(())
}

fn check_fields(definition: &str, fields: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if !is_identifier(field) {
            return Err(EnforcerError::InvalidModel(format!(
                "invalid field name '{}' in '{}'",
                field, definition
            )));
        }
        if !seen.insert(field.as_str()) {
            return Err(EnforcerError::InvalidModel(format!(
                "duplicate field '{}' in '{}'",
                field, definition
            )));
        }
    }
    Ok(())
}

/// Builder for [`Model`]
#[derive(Debug, Default)]
pub struct ModelBuilder {
    request: Vec<String>,
    policies: IndexMap<String, Vec<String>>,
    roles: IndexMap<String, usize>,
    effect: EffectPolicy,
    matcher: String,
}

impl ModelBuilder {
    /// Request definition (`r = sub, obj, act`)
    pub fn request<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Policy definition (`p = sub, obj, act`)
    pub fn policy<I, S>(mut self, ptype: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies
            .insert(ptype.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Grouping definition (`g = _, _` has arity 2, `g = _, _, _` arity 3)
    pub fn role(mut self, ptype: impl Into<String>, arity: usize) -> Self {
        self.roles.insert(ptype.into(), arity);
        self
    }

    pub fn effect(mut self, effect: EffectPolicy) -> Self {
        self.effect = effect;
        self
    }

    pub fn matcher(mut self, matcher: impl Into<String>) -> Self {
        self.matcher = matcher.into();
        self
    }

    pub fn build(self) -> Result<Model> {
        let model = Model {
            request: self.request,
            policies: self.policies,
            roles: self.roles,
            effect: self.effect,
            matcher: self.matcher,
        };
        model.validate()?;
        Ok(model)
    }
}
