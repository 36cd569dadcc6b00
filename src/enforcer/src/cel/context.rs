//! Evaluation context for matcher expressions
//!
//! Binds the function registry and the `g`-family link predicates into a
//! CEL context. A root context is built once per decision; each rule is
//! evaluated in an inner scope that adds the `p` variable.

use cel_interpreter::extractors::Arguments;
use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, ExecutionError};

use super::convert::{cel_to_string, fields_to_cel};
use crate::matchers::FunctionRegistry;
use crate::rbac::LinkPredicate;

/// Variable name for request fields
pub const REQUEST_VAR: &str = "r";

/// Variable name for rule fields
pub const POLICY_VAR: &str = "p";

/// Build the per-decision root context with all functions and the request bound
pub fn root_context(
    functions: &FunctionRegistry,
    links: &[(String, LinkPredicate)],
    request: CelValue,
) -> Context<'static> {
    let mut context = Context::default();
    bind_functions(&mut context, functions);
    bind_links(&mut context, links);
    context.add_variable_from_value(REQUEST_VAR, request);
    context
}

/// Derive a rule scope from the root context
pub fn rule_scope<'a>(root: &'a Context<'a>, tokens: &[String], rule: &[String]) -> Context<'a> {
    let mut scope = root.new_inner_scope();
    let values = rule.iter().map(|field| CelValue::String(field.clone().into()));
    scope.add_variable_from_value(POLICY_VAR, fields_to_cel(tokens, values));
    scope
}

fn bind_functions(context: &mut Context, functions: &FunctionRegistry) {
    for (name, function) in functions.iter() {
        let function = function.clone();
        let function_name = name.to_string();

        context.add_function(
            name,
            move |Arguments(args): Arguments| -> Result<bool, ExecutionError> {
                let rendered: Vec<String> = args.iter().map(cel_to_string).collect();
                let refs: Vec<&str> = rendered.iter().map(String::as_str).collect();
                function(refs.as_slice())
                    .map_err(|e| ExecutionError::function_error(&function_name, e.to_string()))
            },
        );
    }
}

fn bind_links(context: &mut Context, links: &[(String, LinkPredicate)]) {
    for (name, link) in links {
        let link = link.clone();
        let function_name = name.clone();

        context.add_function(
            name.as_str(),
            move |Arguments(args): Arguments| -> Result<bool, ExecutionError> {
                let rendered: Vec<String> = args.iter().map(cel_to_string).collect();
                match rendered.as_slice() {
                    [name1, name2] => Ok(link(name1.as_str(), name2.as_str(), None)),
                    [name1, name2, domain] => {
                        Ok(link(name1.as_str(), name2.as_str(), Some(domain.as_str())))
                    }
                    _ => Err(ExecutionError::function_error(
                        &function_name,
                        format!("expects 2 or 3 arguments, got {}", rendered.len()),
                    )),
                }
            },
        );
    }
}
