//! Compiled matcher expression

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, ExecutionError, Program};
use std::collections::HashSet;
use std::fmt;

use crate::error::{EnforcerError, Result};

/// Functions provided by the CEL runtime itself
const CEL_BUILTINS: &[&str] = &[
    "contains",
    "size",
    "has",
    "map",
    "filter",
    "all",
    "exists",
    "exists_one",
    "max",
    "startsWith",
    "endsWith",
    "matches",
    "string",
    "int",
    "uint",
    "double",
    "bytes",
    "duration",
    "timestamp",
];

/// Names a matcher expression may reference
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    variables: HashSet<String>,
    functions: HashSet<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.insert(name.into());
        self
    }

    pub fn with_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions.extend(names.into_iter().map(Into::into));
        self
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name) || CEL_BUILTINS.contains(&name)
    }
}

/// Matcher expression compiled once and evaluated per rule
pub struct MatcherProgram {
    expression: String,
    program: Program,
}

impl MatcherProgram {
    /// Compile `expression` and check every referenced symbol against `symbols`
    ///
    /// # Errors
    ///
    /// [`EnforcerError::InvalidMatcher`] on syntax errors, unbound variables,
    /// or calls to unregistered functions.
    pub fn compile(expression: &str, symbols: &SymbolTable) -> Result<Self> {
        if expression.trim().is_empty() {
            return Err(EnforcerError::InvalidMatcher("matcher is empty".to_string()));
        }

        let program = Program::compile(expression)
            .map_err(|e| EnforcerError::InvalidMatcher(format!("{:?}", e)))?;

        let references = program.references();
        for variable in references.variables() {
            if !symbols.has_variable(variable) {
                return Err(EnforcerError::InvalidMatcher(format!(
                    "unbound variable '{}' in '{}'",
                    variable, expression
                )));
            }
        }
        for function in references.functions() {
            if !symbols.has_function(function) {
                return Err(EnforcerError::InvalidMatcher(format!(
                    "unknown function '{}' in '{}'",
                    function, expression
                )));
            }
        }

        Ok(Self {
            expression: expression.to_string(),
            program,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate against a fully bound context
    ///
    /// # Errors
    ///
    /// [`EnforcerError::Function`] when a bound function fails,
    /// [`EnforcerError::Evaluation`] for any other runtime failure or a
    /// non-boolean result.
    pub fn evaluate(&self, context: &Context) -> Result<bool> {
        let result = self.program.execute(context).map_err(|e| match e {
            ExecutionError::FunctionError { function, message } => EnforcerError::Function {
                name: function,
                message,
            },
            other => EnforcerError::Evaluation(format!("{:?}", other)),
        })?;

        match result {
            CelValue::Bool(b) => Ok(b),
            other => Err(EnforcerError::Evaluation(format!(
                "matcher '{}' returned a non-boolean value: {:?}",
                self.expression, other
            ))),
        }
    }
}

impl fmt::Debug for MatcherProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherProgram")
            .field("expression", &self.expression)
            .finish()
    }
}
