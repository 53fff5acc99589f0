//! Boolean evaluation of heterogeneous values.

use serde_json::Value;

/// Truthiness: null, false, zero and empty containers are falsy, everything
/// else is truthy.
pub(super) fn truthy(what: &Value) -> bool {
    match what {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use crate::Rule;
    use serde_json::json;

    #[test]
    fn truthy_satisfied() {
        let cases = [
            (json!(true), true),
            (json!(false), false),
            (json!(1), true),
            (json!(0), false),
            (json!(0.0), false),
            (json!(-1), true),
            (json!("x"), true),
            (json!(""), false),
            (json!([1]), true),
            (json!([]), false),
            (json!({"a": 1}), true),
            (json!({}), false),
            (json!(null), false),
        ];
        for (what, expected) in cases {
            assert_eq!(expected, Rule::Truthy.satisfied(&what, None), "{:?}", what);
            assert_eq!(!expected, Rule::Falsy.satisfied(&what, None), "{:?}", what);
        }
    }

    #[test]
    fn connectives_compose() {
        let between = Rule::and([Rule::greater(50), Rule::less(999)]);
        assert!(between.satisfied(&json!(80), None));
        assert!(!between.satisfied(&json!(1000), None));
        assert!(!between.satisfied(&json!(10), None));

        let either = Rule::or([Rule::eq("fork"), Rule::eq("clone")]);
        assert!(either.satisfied(&json!("clone"), None));
        assert!(!either.satisfied(&json!("push"), None));
    }

    #[test]
    fn not_negates() {
        let rule = Rule::not(Rule::eq("fork"));
        assert!(!rule.satisfied(&json!("fork"), None));
        assert!(rule.satisfied(&json!("clone"), None));
    }
}
