//! Ordered comparison over heterogeneous values.
//!
//! Two-valued semantics: a comparison between values of incompatible shapes
//! is simply false, never an error.

use std::cmp::Ordering;

use serde_json::Value;

/// Equality that treats all JSON numbers as one numeric domain, so an
/// integer-shaped `80` equals a float-shaped `80.0`.
pub(super) fn eq(what: &Value, val: &Value) -> bool {
    match (what, val) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq(x, y))
        }
        _ => what == val,
    }
}

pub(super) fn ordered(what: &Value, val: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    cmp(what, val).map_or(false, accept)
}

fn cmp(what: &Value, val: &Value) -> Option<Ordering> {
    match (what, val) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}
