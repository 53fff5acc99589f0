use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A concrete access attempt submitted for decision: who (`subject`) wants
/// to do what (`action`) to which `resource`, under what `context`.
///
/// Fields are heterogeneous: each of `subject`/`action`/`resource` is either
/// a scalar or an object of attribute → value. An inquiry is immutable once
/// built; [`Guard`](`crate::Guard`) never mutates it during a decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    #[serde(default)]
    pub subject: Value,
    #[serde(default)]
    pub action: Value,
    #[serde(default)]
    pub resource: Value,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

impl Inquiry {
    pub fn new(
        subject: impl Into<Value>,
        action: impl Into<Value>,
        resource: impl Into<Value>,
    ) -> Self {
        Self {
            subject: subject.into(),
            action: action.into(),
            resource: resource.into(),
            context: BTreeMap::new(),
        }
    }

    /// Attaches contextual attributes, consuming the inquiry builder-style.
    pub fn with_context<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.context
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_inquiry_has_null_fields() {
        let inquiry = Inquiry::default();
        assert_eq!(Value::Null, inquiry.subject);
        assert_eq!(Value::Null, inquiry.action);
        assert_eq!(Value::Null, inquiry.resource);
        assert!(inquiry.context.is_empty());
    }

    #[test]
    fn serializes_to_canonical_form() {
        let inquiry = Inquiry::new("Max", "update", "myrn:example.com:resource:123")
            .with_context([("ip", json!("127.0.0.1"))]);

        let json = serde_json::to_value(&inquiry).unwrap();
        assert_eq!(
            json!({
                "subject": "Max",
                "action": "update",
                "resource": "myrn:example.com:resource:123",
                "context": {"ip": "127.0.0.1"}
            }),
            json
        );
    }

    #[test]
    fn round_trips_through_json() {
        let inquiry = Inquiry::new(json!({"name": "larry", "stars": 80}), "fork", "repos/google/tensorflow")
            .with_context([("referer", "https://github.com")]);

        let text = serde_json::to_string(&inquiry).unwrap();
        let restored: Inquiry = serde_json::from_str(&text).unwrap();
        assert_eq!(inquiry, restored);
    }

    #[test]
    fn missing_fields_deserialize_as_null() {
        let inquiry: Inquiry = serde_json::from_str(r#"{"subject": "Max"}"#).unwrap();
        assert_eq!(json!("Max"), inquiry.subject);
        assert_eq!(Value::Null, inquiry.action);
        assert!(inquiry.context.is_empty());
    }
}
