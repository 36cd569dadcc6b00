//! Named function registry for matcher expressions

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::builtin;
use super::error::Result;

/// A predicate callable from a matcher expression.
///
/// Receives every positional argument of the call rendered as a string.
pub type MatcherFunction = Arc<dyn Fn(&[&str]) -> Result<bool> + Send + Sync>;

/// Open registry of matcher functions, keyed by the name used in expressions
///
/// # Example
///
/// ```
/// use cretoai_enforcer::matchers::FunctionRegistry;
///
/// let mut registry = FunctionRegistry::with_builtins();
/// registry.register_predicate("isEven", |args| {
///     args.first().and_then(|v| v.parse::<i64>().ok()).is_some_and(|n| n % 2 == 0)
/// });
///
/// assert!(registry.contains("keyMatch2"));
/// assert!(registry.call("isEven", &["4"]).unwrap().unwrap());
/// ```
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, MatcherFunction>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the built-in matchers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::KEY_MATCH, builtin::key_match_func);
        registry.register(builtin::KEY_MATCH2, builtin::key_match2_func);
        registry.register(builtin::KEY_MATCH3, builtin::key_match3_func);
        registry.register(builtin::KEY_MATCH4, builtin::key_match4_func);
        registry.register(builtin::REGEX_MATCH, builtin::regex_match_func);
        registry.register(builtin::GLOB_MATCH, builtin::glob_match_func);
        registry.register(builtin::IP_MATCH, builtin::ip_match_func);
        registry
    }

    /// Register (or replace) a fallible function
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[&str]) -> Result<bool> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Register (or replace) an infallible predicate
    pub fn register_predicate<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&[&str]) -> bool + Send + Sync + 'static,
    {
        self.register(name, move |args: &[&str]| Ok(predicate(args)));
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&MatcherFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Invoke a function by name; `None` if it is not registered
    pub fn call(&self, name: &str, args: &[&str]) -> Option<Result<bool>> {
        self.functions.get(name).map(|f| f(args))
    }

    /// Iterate over registered functions in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MatcherFunction)> {
        self.functions.iter().map(|(name, f)| (name.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::MatchError;

    #[test]
    fn test_builtins_registered() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(registry.len(), 7);
        for name in [
            "keyMatch",
            "keyMatch2",
            "keyMatch3",
            "keyMatch4",
            "regexMatch",
            "globMatch",
            "ipMatch",
        ] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn test_call_builtin() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(registry.call("keyMatch", &["/foo/bar", "/foo/*"]), Some(Ok(true)));
        assert_eq!(registry.call("ipMatch", &["10.0.0.1", "192.168.2.0/24"]), Some(Ok(false)));
        assert!(registry.call("unknown", &["a", "b"]).is_none());
    }

    #[test]
    fn test_register_custom_function() {
        let mut registry = FunctionRegistry::new();
        assert!(registry.is_empty());

        registry.register_predicate("startsWithAdmin", |args| {
            args.first().is_some_and(|a| a.starts_with("admin"))
        });
        assert_eq!(registry.call("startsWithAdmin", &["admin:root"]), Some(Ok(true)));
        assert_eq!(registry.call("startsWithAdmin", &["user:bob"]), Some(Ok(false)));
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = FunctionRegistry::with_builtins();
        registry.register_predicate("keyMatch", |_| false);
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.call("keyMatch", &["/foo", "/foo"]), Some(Ok(false)));
    }

    #[test]
    fn test_fallible_function_error() {
        let registry = FunctionRegistry::with_builtins();
        let result = registry.call("keyMatch4", &["/only-one"]);
        assert!(matches!(result, Some(Err(MatchError::MissingArgument { .. }))));
    }
}
