//! Inquiry-related rules.
//!
//! A legacy family kept so that stored policies using it remain meaningful:
//! the candidate is compared against a field of the inquiry currently under
//! decision. Without an inquiry these rules are never satisfied.

use serde_json::Value;

use crate::Inquiry;

pub(super) fn subject_equal(what: &Value, inquiry: Option<&Inquiry>) -> bool {
    inquiry.map_or(false, |i| *what == i.subject)
}

pub(super) fn action_equal(what: &Value, inquiry: Option<&Inquiry>) -> bool {
    inquiry.map_or(false, |i| *what == i.action)
}

pub(super) fn resource_in(what: &Value, inquiry: Option<&Inquiry>) -> bool {
    match (what, inquiry) {
        (Value::Array(items), Some(i)) => items.contains(&i.resource),
        _ => false,
    }
}
