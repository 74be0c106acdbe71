//! Structural fold that reduces a query response to identifiers.
//!
//! Objects collapse to their target key unless they carry nested objects or
//! lists worth keeping. Scalar attributes other than the target never survive.

use serde_json::{Map, Value};

const ENVELOPE_KEY: &str = "data";

/// Render a wire identifier (string or number) as a string.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A non-empty object or a non-empty list.
fn is_complex(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Normalize a full query response, unwrapping a lone `data` envelope first.
pub fn flatten_to_target(response: &Value, target_key: &str) -> Value {
    let body = match response {
        Value::Object(map) if map.len() == 1 && map.contains_key(ENVELOPE_KEY) => &map[ENVELOPE_KEY],
        other => other,
    };
    fold(body, target_key)
}

fn fold(value: &Value, target_key: &str) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| fold(item, target_key))
                .filter(|item| !item.is_null())
                .collect(),
        ),
        Value::Object(map) => fold_object(map, target_key),
        scalar => scalar.clone(),
    }
}

fn fold_object(map: &Map<String, Value>, target_key: &str) -> Value {
    let target = map.get(target_key).and_then(id_string);
    let has_complex = map
        .iter()
        .any(|(key, value)| key != target_key && is_complex(value));

    if let (Some(id), false) = (&target, has_complex) {
        return Value::String(id.clone());
    }

    let mut out = Map::new();
    if let Some(id) = target {
        out.insert(target_key.to_string(), Value::String(id));
    }
    for (key, value) in map {
        if key == target_key || !is_complex(value) {
            continue;
        }
        let folded = fold(value, target_key);
        if !is_empty_result(&folded) {
            out.insert(key.clone(), folded);
        }
    }

    if out.is_empty() {
        Value::Null
    } else {
        Value::Object(out)
    }
}
