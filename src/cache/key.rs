//! Cache Key Derivation
//!
//! Keys are derived from the logical content of an input, not its shape:
//! - a top-level field holding a `{"value": ..}` wrapper stands for that value
//! - scalars are compared as strings (`null` is the empty string)
//! - object keys are sorted before serialisation
//!
//! Only top-level fields are unwrapped. Everything else, including the
//! top-level object itself and objects nested inside a field, keeps all of
//! its keys.
//!
//! The canonical JSON text is hashed with SHA-256 and truncated to 16 hex
//! characters.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Length of a cache key in hex characters
pub const KEY_LEN: usize = 16;

/// Reduce `input` to its logical content
pub fn normalize(input: &Value) -> Value {
    match input {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), field_content(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => content(other),
    }
}

/// A field is either a `{"value": ..}` wrapper or a plain value
fn field_content(field: &Value) -> Value {
    match field {
        Value::Object(wrapper) => match wrapper.get("value") {
            Some(inner) => content(inner),
            None => content(field),
        },
        other => content(other),
    }
}

fn content(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), content(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(content).collect()),
        Value::String(s) => Value::String(s.clone()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Null => Value::String(String::new()),
    }
}

/// Serialise with object keys in sorted order, whatever the map's own order
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Canonical text of the normalised input
pub fn canonical_json(input: &Value) -> String {
    let mut out = String::new();
    write_canonical(&normalize(input), &mut out);
    out
}

/// Cache key for `input`
pub fn cache_key(input: &Value) -> String {
    let digest = Sha256::digest(canonical_json(input).as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(KEY_LEN);
    hex
}
