//! Policy enforcer
//!
//! Orchestrates one decision: binds the request, walks the rules of the
//! matcher's policy type, evaluates the compiled matcher for each, and
//! combines satisfied rule effects.
//!
//! # Architecture
//!
//! ```text
//! request → r ─┐
//! rule    → p ─┼→ MatcherProgram ──satisfied──→ EffectStream → Decision
//! g(a, b) ─────┘        ↑
//!    ↑          FunctionRegistry
//! RoleManager
//! ```

pub mod decision;
pub mod distributed;

pub use decision::{Decision, DecisionReason};
pub use distributed::DistributedEnforcer;

use cel_interpreter::objects::Value as CelValue;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapter::Adapter;
use crate::cel::convert::{fields_to_cel, json_to_cel, string_to_cel};
use crate::cel::{root_context, rule_scope, MatcherProgram, SymbolTable, POLICY_VAR, REQUEST_VAR};
use crate::effector::{Effect, EffectPolicy, EffectStream};
use crate::error::{EnforcerError, Result};
use crate::matchers::{self, FunctionRegistry};
use crate::model::{Model, EFFECT_FIELD, POLICY_SECTION, PRIORITY_FIELD, ROLE_SECTION};
use crate::policy::{PolicySet, Rule};
use crate::rbac::{
    make_link_predicate, DefaultRoleManager, LinkPredicate, RoleManager, SharedRoleManager,
    DEFAULT_MAX_HIERARCHY_LEVEL,
};

/// Enforcer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    /// Depth bound for role manager traversals created by the enforcer
    pub max_hierarchy_level: usize,

    /// Attach the deciding rule to decisions
    pub enable_explain: bool,

    /// Log every decision at info level instead of debug
    pub log_decisions: bool,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            max_hierarchy_level: DEFAULT_MAX_HIERARCHY_LEVEL,
            enable_explain: true,
            log_decisions: false,
        }
    }
}

/// Builder for [`Enforcer`]
pub struct EnforcerBuilder {
    model: Model,
    config: EnforcerConfig,
    functions: FunctionRegistry,
    role_managers: IndexMap<String, SharedRoleManager>,
    adapter: Option<Arc<dyn Adapter>>,
}

impl EnforcerBuilder {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            config: EnforcerConfig::default(),
            functions: FunctionRegistry::with_builtins(),
            role_managers: IndexMap::new(),
            adapter: None,
        }
    }

    pub fn config(mut self, config: EnforcerConfig) -> Self {
        self.config = config;
        self
    }

    /// Policy store loaded on build and by [`Enforcer::load_policy`]
    pub fn adapter<A>(mut self, adapter: A) -> Self
    where
        A: Adapter + 'static,
    {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    /// Register a fallible matcher function
    pub fn function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[&str]) -> matchers::error::Result<bool> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
        self
    }

    /// Register an infallible matcher predicate
    pub fn predicate<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&[&str]) -> bool + Send + Sync + 'static,
    {
        self.functions.register_predicate(name, predicate);
        self
    }

    /// Replace the whole function registry
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Use a custom role manager for one grouping type
    pub fn role_manager(
        mut self,
        ptype: impl Into<String>,
        role_manager: SharedRoleManager,
    ) -> Self {
        self.role_managers.insert(ptype.into(), role_manager);
        self
    }

    /// Validate, compile the matcher and load the adapter's policy, if any
    pub async fn build(self) -> Result<Enforcer> {
        let enforcer = self.assemble()?;
        if enforcer.adapter.is_some() {
            enforcer.load_policy().await?;
        }
        Ok(enforcer)
    }

    fn assemble(self) -> Result<Enforcer> {
        let EnforcerBuilder {
            model,
            config,
            functions,
            mut role_managers,
            adapter,
        } = self;

        model.validate()?;

        for ptype in role_managers.keys() {
            if model.role_arity(ptype).is_none() {
                return Err(EnforcerError::UnknownPolicyType {
                    section: ROLE_SECTION.to_string(),
                    ptype: ptype.clone(),
                });
            }
        }

        let mut links: Vec<(String, LinkPredicate)> = Vec::new();
        for ptype in model.role_types() {
            if functions.contains(ptype) {
                return Err(EnforcerError::InvalidModel(format!(
                    "function '{}' collides with the grouping type of the same name",
                    ptype
                )));
            }

            let rm = role_managers
                .entry(ptype.to_string())
                .or_insert_with(|| {
                    DefaultRoleManager::new(config.max_hierarchy_level).into_shared()
                })
                .clone();
            links.push((ptype.to_string(), make_link_predicate(Some(rm))));
        }

        let symbols = SymbolTable::new()
            .with_variable(REQUEST_VAR)
            .with_variable(POLICY_VAR)
            .with_functions(functions.iter().map(|(name, _)| name.to_string()))
            .with_functions(model.role_types());
        let program = MatcherProgram::compile(model.matcher(), &symbols)?;

        info!(
            "Enforcer initialized with effect={}, policy types={:?}, grouping types={:?}",
            model.effect(),
            model.policy_types().collect::<Vec<_>>(),
            model.role_types().collect::<Vec<_>>()
        );

        Ok(Enforcer {
            model: Arc::new(model),
            config,
            program,
            functions,
            role_managers,
            links,
            policy: RwLock::new(PolicySet::new()),
            adapter,
        })
    }
}

/// Model-driven policy enforcer
pub struct Enforcer {
    model: Arc<Model>,
    config: EnforcerConfig,
    program: MatcherProgram,
    functions: FunctionRegistry,
    /// One role manager per grouping type
    role_managers: IndexMap<String, SharedRoleManager>,
    /// `g`-family predicates bound into every decision
    links: Vec<(String, LinkPredicate)>,
    policy: RwLock<PolicySet>,
    adapter: Option<Arc<dyn Adapter>>,
}

impl Enforcer {
    /// Enforcer with an empty policy and the built-in functions
    pub fn new(model: Model) -> Result<Self> {
        EnforcerBuilder::new(model).assemble()
    }

    pub fn builder(model: Model) -> EnforcerBuilder {
        EnforcerBuilder::new(model)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Role manager backing one grouping type
    pub fn role_manager(&self, ptype: &str) -> Option<SharedRoleManager> {
        self.role_managers.get(ptype).cloned()
    }

    /// Decide a request of string fields
    ///
    /// # Errors
    ///
    /// [`EnforcerError::InvalidRequest`] if the request arity does not match
    /// the request definition; matcher evaluation errors otherwise.
    pub fn enforce<S: AsRef<str>>(&self, request: &[S]) -> Result<bool> {
        Ok(self.enforce_ex(request)?.allowed)
    }

    /// Decide a request and explain the outcome
    pub fn enforce_ex<S: AsRef<str>>(&self, request: &[S]) -> Result<Decision> {
        let values = request.iter().map(|field| string_to_cel(field.as_ref())).collect();
        let decision = self.decide(values)?;
        self.log_decision(&request.iter().map(|f| f.as_ref()).collect::<Vec<_>>(), &decision);
        Ok(decision)
    }

    /// Decide a request whose fields may be JSON objects (`r.sub.age > 18`)
    pub fn enforce_json(&self, request: &[serde_json::Value]) -> Result<Decision> {
        let values = request.iter().map(json_to_cel).collect();
        let decision = self.decide(values)?;
        self.log_decision(request, &decision);
        Ok(decision)
    }

    fn log_decision<T: fmt::Debug + ?Sized>(&self, request: &T, decision: &Decision) {
        if self.config.log_decisions {
            info!(
                "Decision: {} for {:?} ({:?})",
                if decision.allowed { "ALLOW" } else { "DENY" },
                request,
                decision.reason
            );
        } else {
            debug!(
                "Decision: {} for {:?} ({:?})",
                if decision.allowed { "ALLOW" } else { "DENY" },
                request,
                decision.reason
            );
        }
    }

    fn decide(&self, request: Vec<CelValue>) -> Result<Decision> {
        let request_tokens = self.model.request_tokens();
        if request.len() != request_tokens.len() {
            return Err(EnforcerError::InvalidRequest(format!(
                "expected {} fields ({}), got {}",
                request_tokens.len(),
                request_tokens.join(", "),
                request.len()
            )));
        }

        let ptype = self.model.primary_policy_type();
        let policy_tokens = self.model.policy_tokens(ptype).ok_or_else(|| {
            EnforcerError::InvalidModel(format!("policy definition '{}' is missing", ptype))
        })?;
        let effect_policy = self.model.effect();

        let root = root_context(
            &self.functions,
            &self.links,
            fields_to_cel(request_tokens, request),
        );

        let policy = self.policy.read();
        let rules: Vec<&Rule> = policy.iter(ptype).collect();

        if rules.is_empty() {
            let empty = vec![String::new(); policy_tokens.len()];
            let scope = rule_scope(&root, policy_tokens, &empty);
            if !self.program.evaluate(&scope)? {
                return Ok(Decision::default_for(effect_policy));
            }

            let mut stream = EffectStream::new(effect_policy);
            stream.push(Effect::Allow, 0);
            let (allowed, _) = stream.finish();
            return Ok(Decision::combined(allowed, effect_policy));
        }

        let effect_index = self.model.field_index(ptype, EFFECT_FIELD);
        let mut stream = EffectStream::new(effect_policy);
        let mut satisfied = 0usize;

        for index in self.evaluation_order(ptype, &rules) {
            let rule = rules[index];
            let scope = rule_scope(&root, policy_tokens, rule);
            if !self.program.evaluate(&scope)? {
                continue;
            }

            satisfied += 1;
            let effect = effect_index
                .and_then(|i| rule.get(i))
                .map(|value| Effect::from_field(value))
                .unwrap_or(Effect::Allow);

            if stream.push(effect, index) {
                break;
            }
        }

        let (allowed, explain) = stream.finish();
        let decision = match explain {
            Some(index) if self.config.enable_explain => {
                Decision::matched(allowed, rules[index].clone())
            }
            Some(_) => Decision {
                allowed,
                rule: None,
                reason: DecisionReason::RuleMatch,
            },
            None if satisfied > 0 => Decision::combined(allowed, effect_policy),
            None => Decision::default_for(effect_policy),
        };

        Ok(decision)
    }

    /// Rule indices in evaluation order.
    ///
    /// Under the priority effect, rules are ordered by their `priority` field
    /// (ascending, stable) when the policy definition has one.
    fn evaluation_order(&self, ptype: &str, rules: &[&Rule]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..rules.len()).collect();

        if self.model.effect() == EffectPolicy::Priority {
            if let Some(field) = self.model.field_index(ptype, PRIORITY_FIELD) {
                order.sort_by_key(|&i| {
                    rules[i]
                        .get(field)
                        .and_then(|value| value.trim().parse::<i64>().ok())
                        .unwrap_or(i64::MAX)
                });
            }
        }

        order
    }

    /// Check a rule against its definition before it enters the policy set
    pub(crate) fn check_rule(&self, section: &str, ptype: &str, rule: &[String]) -> Result<()> {
        let arity = self.model.arity(section, ptype)?;
        if rule.len() != arity {
            return Err(EnforcerError::InvalidRule(format!(
                "{} rule {:?} has {} fields, expected {}",
                ptype,
                rule,
                rule.len(),
                arity
            )));
        }

        if section == POLICY_SECTION {
            if let Some(field) = self.model.field_index(ptype, PRIORITY_FIELD) {
                if rule[field].trim().parse::<i64>().is_err() {
                    return Err(EnforcerError::InvalidRule(format!(
                        "{} rule {:?} has a non-integer priority '{}'",
                        ptype, rule, rule[field]
                    )));
                }
            }
        }

        Ok(())
    }

    // Policy queries

    /// Rules of the primary policy type
    pub fn get_policy(&self) -> Vec<Rule> {
        self.get_named_policy(self.model.primary_policy_type())
    }

    pub fn get_named_policy(&self, ptype: &str) -> Vec<Rule> {
        self.policy.read().get(ptype)
    }

    /// Rules of the `g` grouping type
    pub fn get_grouping_policy(&self) -> Vec<Rule> {
        self.get_named_grouping_policy(ROLE_SECTION)
    }

    pub fn get_named_grouping_policy(&self, ptype: &str) -> Vec<Rule> {
        self.policy.read().get(ptype)
    }

    /// Whether the primary policy type contains `rule`
    pub fn has_policy<S: AsRef<str>>(&self, rule: &[S]) -> bool {
        self.has_named_policy(self.model.primary_policy_type(), rule)
    }

    pub fn has_named_policy<S: AsRef<str>>(&self, ptype: &str, rule: &[S]) -> bool {
        self.policy.read().contains(ptype, &to_rule(rule))
    }

    pub fn has_grouping_policy<S: AsRef<str>>(&self, rule: &[S]) -> bool {
        self.has_named_policy(ROLE_SECTION, rule)
    }

    /// Rules of every ptype, section by section
    pub fn policy_snapshot(&self) -> Vec<(String, Rule)> {
        self.policy.read().snapshot()
    }

    // Role queries against the `g` role manager

    pub fn get_roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        self.with_default_role_manager(|rm| rm.get_roles(name, domain))
            .unwrap_or_default()
    }

    pub fn get_users_for_role(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        self.with_default_role_manager(|rm| rm.get_users(name, domain))
            .unwrap_or_default()
    }

    pub fn has_role_for_user(&self, name: &str, role: &str, domain: Option<&str>) -> bool {
        self.with_default_role_manager(|rm| rm.get_roles(name, domain).iter().any(|r| r == role))
            .unwrap_or(false)
    }

    /// Every role `name` inherits, directly or transitively
    pub fn get_implicit_roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
        self.with_default_role_manager(|rm| rm.get_implicit_roles(name, domain))
            .unwrap_or_default()
    }

    fn with_default_role_manager<T>(&self, f: impl FnOnce(&dyn RoleManager) -> T) -> Option<T> {
        let rm = self.role_managers.get(ROLE_SECTION)?;
        let guard = rm.read();
        Some(f(&*guard))
    }

    // Loading and saving

    /// Reload the whole policy from the adapter and rebuild role links
    ///
    /// # Errors
    ///
    /// [`EnforcerError::Adapter`] if no adapter is configured or it fails;
    /// rule validation errors leave the current policy untouched.
    pub async fn load_policy(&self) -> Result<()> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or_else(|| EnforcerError::Adapter("no adapter configured".to_string()))?;

        let loaded = adapter.load_policy().await?;

        let mut next = PolicySet::new();
        for (ptype, rule) in loaded {
            let section = self.model.section_of(&ptype).ok_or_else(|| {
                EnforcerError::UnknownPolicyType {
                    section: ptype.get(..1).unwrap_or_default().to_string(),
                    ptype: ptype.clone(),
                }
            })?;
            self.check_rule(section, &ptype, &rule)?;
            next.add(&ptype, rule);
        }

        let mut policy = self.policy.write();
        *policy = next;
        self.rebuild_role_links(&policy);

        info!("Policy loaded: {} rules", policy.total_len());
        Ok(())
    }

    /// Flush every section to the adapter
    pub async fn save_policy(&self) -> Result<()> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or_else(|| EnforcerError::Adapter("no adapter configured".to_string()))?;

        let snapshot = self.policy.read().snapshot();
        let count = snapshot.len();
        adapter.save_policy(snapshot).await?;

        info!("Policy saved: {} rules", count);
        Ok(())
    }

    /// Clear every role manager and re-add the edges of all grouping rules.
    ///
    /// Called with the policy write lock held.
    fn rebuild_role_links(&self, policy: &PolicySet) {
        for (ptype, rm) in &self.role_managers {
            let mut rm = rm.write();
            rm.clear();
            for rule in policy.iter(ptype) {
                link_rule(&mut *rm, rule);
            }
        }
    }
}

impl fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enforcer")
            .field("model", &self.model)
            .field("config", &self.config)
            .field("program", &self.program)
            .field("functions", &self.functions)
            .field("role_managers", &self.role_managers.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn to_rule<S: AsRef<str>>(fields: &[S]) -> Rule {
    fields.iter().map(|f| f.as_ref().to_string()).collect()
}

/// Add the edge described by a grouping rule (`child, parent[, domain]`)
pub(crate) fn link_rule(rm: &mut dyn RoleManager, rule: &[String]) {
    if let [child, parent, rest @ ..] = rule {
        rm.add_link(child, parent, rest.first().map(String::as_str));
    }
}

/// Remove the edge described by a grouping rule
pub(crate) fn unlink_rule(rm: &mut dyn RoleManager, rule: &[String]) {
    if let [child, parent, rest @ ..] = rule {
        rm.delete_link(child, parent, rest.first().map(String::as_str));
    }
}
