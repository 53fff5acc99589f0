//! List membership rules.
//!
//! The `All*`/`Any*` family treats the candidate as a collection: anything
//! that is not a JSON array is not satisfied.

use serde_json::Value;

use super::compare;

pub(super) fn contains(vals: &[Value], what: &Value) -> bool {
    vals.iter().any(|v| compare::eq(what, v))
}

pub(super) fn all_in(vals: &[Value], what: &Value) -> bool {
    match what {
        Value::Array(items) => items.iter().all(|item| contains(vals, item)),
        _ => false,
    }
}

pub(super) fn all_not_in(vals: &[Value], what: &Value) -> bool {
    match what {
        Value::Array(items) => items.iter().all(|item| !contains(vals, item)),
        _ => false,
    }
}

pub(super) fn any_in(vals: &[Value], what: &Value) -> bool {
    match what {
        Value::Array(items) => items.iter().any(|item| contains(vals, item)),
        _ => false,
    }
}

pub(super) fn any_not_in(vals: &[Value], what: &Value) -> bool {
    match what {
        Value::Array(items) => items.iter().any(|item| !contains(vals, item)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::Rule;
    use serde_json::{json, Value};

    fn vals() -> Vec<Value> {
        vec![json!(1), json!(2), json!("three")]
    }

    #[test]
    fn scalar_membership() {
        assert!(Rule::In(vals()).satisfied(&json!(2), None));
        assert!(Rule::In(vals()).satisfied(&json!("three"), None));
        assert!(!Rule::In(vals()).satisfied(&json!(4), None));
        assert!(Rule::NotIn(vals()).satisfied(&json!(4), None));
        assert!(!Rule::NotIn(vals()).satisfied(&json!(1), None));
    }

    #[test]
    fn all_in_requires_every_element() {
        assert!(Rule::AllIn(vals()).satisfied(&json!([1, 2]), None));
        assert!(!Rule::AllIn(vals()).satisfied(&json!([1, 4]), None));
        assert!(Rule::AllIn(vals()).satisfied(&json!([]), None));
    }

    #[test]
    fn all_not_in_requires_no_element() {
        assert!(Rule::AllNotIn(vals()).satisfied(&json!([4, 5]), None));
        assert!(!Rule::AllNotIn(vals()).satisfied(&json!([4, 1]), None));
    }

    #[test]
    fn any_in_requires_at_least_one() {
        assert!(Rule::AnyIn(vals()).satisfied(&json!([4, 1]), None));
        assert!(!Rule::AnyIn(vals()).satisfied(&json!([4, 5]), None));
        assert!(!Rule::AnyIn(vals()).satisfied(&json!([]), None));
    }

    #[test]
    fn any_not_in_requires_at_least_one_outsider() {
        assert!(Rule::AnyNotIn(vals()).satisfied(&json!([1, 4]), None));
        assert!(!Rule::AnyNotIn(vals()).satisfied(&json!([1, 2]), None));
    }

    #[test]
    fn collection_rules_reject_scalars() {
        for rule in [
            Rule::AllIn(vals()),
            Rule::AllNotIn(vals()),
            Rule::AnyIn(vals()),
            Rule::AnyNotIn(vals()),
        ] {
            assert!(!rule.satisfied(&json!(1), None));
            assert!(!rule.satisfied(&json!("three"), None));
            assert!(!rule.satisfied(&json!(null), None));
        }
    }
}
