//! Value conversion between request/rule fields and cel_interpreter types

use cel_interpreter::objects::{Key, Map, Value as CelValue};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Convert serde_json::Value to cel_interpreter::Value
pub fn json_to_cel(value: &JsonValue) -> CelValue {
    match value {
        JsonValue::Null => CelValue::Null,
        JsonValue::Bool(b) => CelValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        JsonValue::String(s) => CelValue::String(s.clone().into()),
        JsonValue::Array(arr) => {
            let cel_vec: Vec<CelValue> = arr.iter().map(json_to_cel).collect();
            CelValue::List(cel_vec.into())
        }
        JsonValue::Object(obj) => {
            let map_data: HashMap<Key, CelValue> = obj
                .iter()
                .map(|(k, v)| (Key::from(k.clone()), json_to_cel(v)))
                .collect();
            CelValue::Map(Map { map: Arc::new(map_data) })
        }
    }
}

/// Wrap a string field
pub fn string_to_cel(value: &str) -> CelValue {
    CelValue::String(Arc::new(value.to_string()))
}

/// Bind positional values to their declared field names (e.g. `r.sub`, `p.obj`)
pub fn fields_to_cel<I>(tokens: &[String], values: I) -> CelValue
where
    I: IntoIterator<Item = CelValue>,
{
    let map_data: HashMap<Key, CelValue> = tokens
        .iter()
        .zip(values)
        .map(|(token, value)| (Key::from(token.clone()), value))
        .collect();
    CelValue::Map(Map { map: Arc::new(map_data) })
}

/// Render a value as a matcher-function argument
pub fn cel_to_string(value: &CelValue) -> String {
    match value {
        CelValue::String(s) => s.to_string(),
        CelValue::Int(i) => i.to_string(),
        CelValue::UInt(u) => u.to_string(),
        CelValue::Float(f) => f.to_string(),
        CelValue::Bool(b) => b.to_string(),
        CelValue::Null => String::new(),
        other => format!("{:?}", other),
    }
}
