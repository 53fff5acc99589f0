//! Canonical JSON form of rules.
//!
//! A rule serializes to `{"type": "warden.rules.<family>.<Name>",
//! "contents": {...}}`. Deserialization resolves `type` against the
//! explicit registry below; an unknown name is a serialization error. There
//! is no reflection and no autoloading: extending the taxonomy means
//! extending the registry.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use super::{CidrBlock, Rule, SearchPattern};

const TYPE_KEY: &str = "type";
const CONTENTS_KEY: &str = "contents";

impl Rule {
    fn type_name(&self) -> &'static str {
        match self {
            Rule::Eq(_) => "warden.rules.compare.Eq",
            Rule::NotEq(_) => "warden.rules.compare.NotEq",
            Rule::Greater(_) => "warden.rules.compare.Greater",
            Rule::Less(_) => "warden.rules.compare.Less",
            Rule::GreaterOrEqual(_) => "warden.rules.compare.GreaterOrEqual",
            Rule::LessOrEqual(_) => "warden.rules.compare.LessOrEqual",
            Rule::Truthy => "warden.rules.logic.Truthy",
            Rule::Falsy => "warden.rules.logic.Falsy",
            Rule::Not(_) => "warden.rules.logic.Not",
            Rule::And(_) => "warden.rules.logic.And",
            Rule::Or(_) => "warden.rules.logic.Or",
            Rule::Any => "warden.rules.logic.Any",
            Rule::Neither => "warden.rules.logic.Neither",
            Rule::In(_) => "warden.rules.list.In",
            Rule::NotIn(_) => "warden.rules.list.NotIn",
            Rule::AllIn(_) => "warden.rules.list.AllIn",
            Rule::AllNotIn(_) => "warden.rules.list.AllNotIn",
            Rule::AnyIn(_) => "warden.rules.list.AnyIn",
            Rule::AnyNotIn(_) => "warden.rules.list.AnyNotIn",
            Rule::Cidr(_) => "warden.rules.net.CIDR",
            Rule::StrEqual { .. } => "warden.rules.string.StrEqual",
            Rule::PairsEqual => "warden.rules.string.PairsEqual",
            Rule::RegexMatch(_) => "warden.rules.string.RegexMatch",
            Rule::StartsWith { .. } => "warden.rules.string.StartsWith",
            Rule::EndsWith { .. } => "warden.rules.string.EndsWith",
            Rule::Contains { .. } => "warden.rules.string.Contains",
            Rule::SubjectEqual => "warden.rules.inquiry.SubjectEqual",
            Rule::ActionEqual => "warden.rules.inquiry.ActionEqual",
            Rule::ResourceIn => "warden.rules.inquiry.ResourceIn",
        }
    }

    fn contents(&self) -> Value {
        match self {
            Rule::Eq(val)
            | Rule::NotEq(val)
            | Rule::Greater(val)
            | Rule::Less(val)
            | Rule::GreaterOrEqual(val)
            | Rule::LessOrEqual(val) => json!({ "val": val }),

            Rule::Truthy
            | Rule::Falsy
            | Rule::Any
            | Rule::Neither
            | Rule::PairsEqual
            | Rule::SubjectEqual
            | Rule::ActionEqual
            | Rule::ResourceIn => json!({}),

            Rule::Not(rule) => json!({ "rule": rule.to_value() }),
            Rule::And(rules) | Rule::Or(rules) => {
                json!({ "rules": rules.iter().map(Rule::to_value).collect::<Vec<_>>() })
            }

            Rule::In(vals)
            | Rule::NotIn(vals)
            | Rule::AllIn(vals)
            | Rule::AllNotIn(vals)
            | Rule::AnyIn(vals)
            | Rule::AnyNotIn(vals) => json!({ "vals": vals }),

            Rule::Cidr(block) => json!({ "cidr": block.to_string() }),

            Rule::StrEqual { val, ci }
            | Rule::StartsWith { val, ci }
            | Rule::EndsWith { val, ci }
            | Rule::Contains { val, ci } => json!({ "val": val, "ci": ci }),

            Rule::RegexMatch(pattern) => json!({ "pattern": pattern.as_str() }),
        }
    }

    /// The canonical JSON tree of this rule.
    pub(crate) fn to_value(&self) -> Value {
        json!({ TYPE_KEY: self.type_name(), CONTENTS_KEY: self.contents() })
    }

    /// Rebuilds a rule from its canonical JSON tree.
    pub(crate) fn from_value(value: &Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| "a serialized rule must be a JSON object".to_owned())?;
        let kind = map
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| "a serialized rule must carry a string 'type'".to_owned())?;
        let contents = map
            .get(CONTENTS_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| "a serialized rule must carry an object 'contents'".to_owned())?;

        let val = || field(contents, kind, "val");
        let vals = || {
            field(contents, kind, "vals").and_then(|v| match v {
                Value::Array(items) => Ok(items),
                _ => Err(format!("rule {}: 'vals' must be an array", kind)),
            })
        };
        let text = |key: &str| {
            field(contents, kind, key).and_then(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(format!("rule {}: '{}' must be a string", kind, key)),
            })
        };
        let ci = || match contents.get("ci") {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(format!("rule {}: 'ci' must be a boolean", kind)),
        };
        let children = || {
            field(contents, kind, "rules").and_then(|v| match v {
                Value::Array(items) => items.iter().map(Rule::from_value).collect(),
                _ => Err(format!("rule {}: 'rules' must be an array", kind)),
            })
        };

        let rule = match kind {
            "warden.rules.compare.Eq" => Rule::Eq(val()?),
            "warden.rules.compare.NotEq" => Rule::NotEq(val()?),
            "warden.rules.compare.Greater" => Rule::Greater(val()?),
            "warden.rules.compare.Less" => Rule::Less(val()?),
            "warden.rules.compare.GreaterOrEqual" => Rule::GreaterOrEqual(val()?),
            "warden.rules.compare.LessOrEqual" => Rule::LessOrEqual(val()?),

            "warden.rules.logic.Truthy" => Rule::Truthy,
            "warden.rules.logic.Falsy" => Rule::Falsy,
            "warden.rules.logic.Not" => {
                let inner = field(contents, kind, "rule")?;
                Rule::Not(Box::new(Rule::from_value(&inner)?))
            }
            "warden.rules.logic.And" => Rule::And(children()?),
            "warden.rules.logic.Or" => Rule::Or(children()?),
            "warden.rules.logic.Any" => Rule::Any,
            "warden.rules.logic.Neither" => Rule::Neither,

            "warden.rules.list.In" => Rule::In(vals()?),
            "warden.rules.list.NotIn" => Rule::NotIn(vals()?),
            "warden.rules.list.AllIn" => Rule::AllIn(vals()?),
            "warden.rules.list.AllNotIn" => Rule::AllNotIn(vals()?),
            "warden.rules.list.AnyIn" => Rule::AnyIn(vals()?),
            "warden.rules.list.AnyNotIn" => Rule::AnyNotIn(vals()?),

            "warden.rules.net.CIDR" => {
                Rule::Cidr(CidrBlock::parse(&text("cidr")?).map_err(|e| e.to_string())?)
            }

            "warden.rules.string.StrEqual" => Rule::StrEqual {
                val: text("val")?,
                ci: ci()?,
            },
            "warden.rules.string.PairsEqual" => Rule::PairsEqual,
            "warden.rules.string.RegexMatch" => {
                Rule::RegexMatch(SearchPattern::new(&text("pattern")?).map_err(|e| e.to_string())?)
            }
            "warden.rules.string.StartsWith" => Rule::StartsWith {
                val: text("val")?,
                ci: ci()?,
            },
            "warden.rules.string.EndsWith" => Rule::EndsWith {
                val: text("val")?,
                ci: ci()?,
            },
            "warden.rules.string.Contains" => Rule::Contains {
                val: text("val")?,
                ci: ci()?,
            },

            "warden.rules.inquiry.SubjectEqual" => Rule::SubjectEqual,
            "warden.rules.inquiry.ActionEqual" => Rule::ActionEqual,
            "warden.rules.inquiry.ResourceIn" => Rule::ResourceIn,

            unknown => return Err(format!("unknown rule type '{}'", unknown)),
        };
        Ok(rule)
    }
}

fn field(contents: &Map<String, Value>, kind: &str, key: &str) -> Result<Value, String> {
    contents
        .get(key)
        .cloned()
        .ok_or_else(|| format!("rule {}: missing contents key '{}'", kind, key))
}

/// Whether a JSON object is a serialized rule rather than an
/// attribute-to-rule mapping. The canonical rule form carries exactly the
/// `type`/`contents` pair.
pub(crate) fn looks_like_rule(map: &Map<String, Value>) -> bool {
    map.len() == 2
        && map.get(TYPE_KEY).map_or(false, Value::is_string)
        && map.get(CONTENTS_KEY).map_or(false, Value::is_object)
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Rule::from_value(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use matches::assert_matches;

    fn every_rule() -> Vec<Rule> {
        vec![
            Rule::eq("fork"),
            Rule::not_eq(5),
            Rule::greater(50),
            Rule::less(999),
            Rule::greater_or_equal(50.5),
            Rule::less_or_equal(0),
            Rule::Truthy,
            Rule::Falsy,
            Rule::not(Rule::eq("x")),
            Rule::and([Rule::greater(50), Rule::less(999)]),
            Rule::or([Rule::eq("fork"), Rule::eq("clone")]),
            Rule::Any,
            Rule::Neither,
            Rule::In(vec![json!(1), json!("two")]),
            Rule::NotIn(vec![json!(1)]),
            Rule::AllIn(vec![json!(1), json!(2)]),
            Rule::AllNotIn(vec![json!(3)]),
            Rule::AnyIn(vec![json!(4)]),
            Rule::AnyNotIn(vec![json!(5)]),
            Rule::cidr("192.168.2.0/24").unwrap(),
            Rule::str_equal("books"),
            Rule::StrEqual {
                val: "BOOKS".into(),
                ci: true,
            },
            Rule::PairsEqual,
            Rule::regex_match(r"[\d]+").unwrap(),
            Rule::StartsWith {
                val: "repos/Google".into(),
                ci: true,
            },
            Rule::ends_with(".rs"),
            Rule::contains("oo"),
            Rule::SubjectEqual,
            Rule::ActionEqual,
            Rule::ResourceIn,
        ]
    }

    #[test]
    fn every_rule_round_trips() {
        for rule in every_rule() {
            let json = rule.to_json().unwrap();
            let restored = Rule::from_json(&json).unwrap();
            assert_eq!(rule, restored, "{}", json);
        }
    }

    #[test]
    fn canonical_shape() {
        let rule = Rule::and([Rule::greater(50), Rule::less(999)]);
        assert_eq!(
            json!({
                "type": "warden.rules.logic.And",
                "contents": {"rules": [
                    {"type": "warden.rules.compare.Greater", "contents": {"val": 50}},
                    {"type": "warden.rules.compare.Less", "contents": {"val": 999}},
                ]}
            }),
            rule.to_value()
        );
    }

    #[test]
    fn unknown_type_fails() {
        let json = r#"{"type": "warden.rules.compare.Between", "contents": {"val": 1}}"#;
        assert_matches!(Rule::from_json(json), Err(Error::Serialization(_)));
    }

    #[test]
    fn malformed_contents_fail() {
        let missing = r#"{"type": "warden.rules.compare.Eq", "contents": {}}"#;
        assert_matches!(Rule::from_json(missing), Err(Error::Serialization(_)));

        let bad_cidr = r#"{"type": "warden.rules.net.CIDR", "contents": {"cidr": "nope"}}"#;
        assert_matches!(Rule::from_json(bad_cidr), Err(Error::Serialization(_)));

        let bad_pattern =
            r#"{"type": "warden.rules.string.RegexMatch", "contents": {"pattern": "["}}"#;
        assert_matches!(Rule::from_json(bad_pattern), Err(Error::Serialization(_)));
    }

    #[test]
    fn ci_defaults_to_false() {
        let json = r#"{"type": "warden.rules.string.StrEqual", "contents": {"val": "books"}}"#;
        let rule = Rule::from_json(json).unwrap();
        assert_eq!(
            Rule::StrEqual {
                val: "books".into(),
                ci: false
            },
            rule
        );
    }

    #[test]
    fn rule_object_detection() {
        let rule = Rule::eq(1).to_value();
        assert!(looks_like_rule(rule.as_object().unwrap()));

        let attrs = json!({"name": "larry", "stars": 80});
        assert!(!looks_like_rule(attrs.as_object().unwrap()));

        // an attribute mapping that merely resembles the envelope
        let near_miss = json!({"type": "x", "contents": "y"});
        assert!(!looks_like_rule(near_miss.as_object().unwrap()));
    }
}
