use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::rules::{looks_like_rule, Rule};
use crate::Effect;

/// The typing discipline of a policy, derived from its match elements and
/// never stored on the record itself.
///
/// A policy is string-based when every element of `subjects`, `actions` and
/// `resources` is a literal string; it is rule-based otherwise. Checkers
/// only ever match policies of their own discipline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PolicyType {
    StringBased,
    RuleBased,
}

impl PolicyType {
    /// The marker written into stored policy documents for query
    /// pre-filtering.
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyType::StringBased => "string-based",
            PolicyType::RuleBased => "rule-based",
        }
    }
}

/// One attribute inside an [`Element::Object`] mapping: either a literal
/// string compared for equality, or a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrMatch {
    Literal(String),
    Rule(Rule),
}

impl From<&str> for AttrMatch {
    fn from(s: &str) -> Self {
        AttrMatch::Literal(s.to_owned())
    }
}

impl From<String> for AttrMatch {
    fn from(s: String) -> Self {
        AttrMatch::Literal(s)
    }
}

impl From<Rule> for AttrMatch {
    fn from(rule: Rule) -> Self {
        AttrMatch::Rule(rule)
    }
}

/// A match element of a policy's `subjects`/`actions`/`resources` sequence:
/// a literal string, a bare rule, or a mapping of attribute name to match.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Literal(String),
    Atom(Rule),
    Object(BTreeMap<String, AttrMatch>),
}

impl Element {
    /// An attribute-mapping element, e.g.
    /// `Element::object([("stars", Rule::greater(50).into())])`.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, AttrMatch)>,
        K: Into<String>,
    {
        Element::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Element::Literal(_))
    }

    fn to_value(&self) -> Value {
        match self {
            Element::Literal(s) => Value::String(s.clone()),
            Element::Atom(rule) => rule.to_value(),
            Element::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let value = match v {
                            AttrMatch::Literal(s) => Value::String(s.clone()),
                            AttrMatch::Rule(rule) => rule.to_value(),
                        };
                        (k.clone(), value)
                    })
                    .collect(),
            ),
        }
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::String(s) => Ok(Element::Literal(s.clone())),
            Value::Object(map) if looks_like_rule(map) => {
                Ok(Element::Atom(Rule::from_value(value)?))
            }
            Value::Object(map) => {
                let mut attrs = BTreeMap::new();
                for (key, value) in map {
                    let attr = match value {
                        Value::String(s) => AttrMatch::Literal(s.clone()),
                        Value::Object(inner) if looks_like_rule(inner) => {
                            AttrMatch::Rule(Rule::from_value(value)?)
                        }
                        _ => {
                            return Err(format!(
                                "attribute '{}' must map to a string or a serialized rule",
                                key
                            ))
                        }
                    };
                    attrs.insert(key.clone(), attr);
                }
                Ok(Element::Object(attrs))
            }
            _ => Err("a match element must be a string, a serialized rule, \
                      or an attribute mapping"
                .to_owned()),
        }
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::Literal(s.to_owned())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Element::Literal(s)
    }
}

impl From<Rule> for Element {
    fn from(rule: Rule) -> Self {
        Element::Atom(rule)
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Element::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// A named record pairing match conditions over subject, action, resource
/// and context with an [`Effect`].
///
/// Policies are built with [`Policy::builder`] and validated both on
/// construction and on load; from the decision engine's point of view a
/// policy is an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyRepr", into = "PolicyRepr")]
pub struct Policy {
    uid: String,
    description: Option<String>,
    effect: Effect,
    subjects: Vec<Element>,
    actions: Vec<Element>,
    resources: Vec<Element>,
    context: BTreeMap<String, Rule>,
}

impl Policy {
    pub fn builder(uid: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder {
            uid: uid.into(),
            description: None,
            effect: Effect::Deny,
            subjects: Vec::new(),
            actions: Vec::new(),
            resources: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn subjects(&self) -> &[Element] {
        &self.subjects
    }

    pub fn actions(&self) -> &[Element] {
        &self.actions
    }

    pub fn resources(&self) -> &[Element] {
        &self.resources
    }

    pub fn context(&self) -> &BTreeMap<String, Rule> {
        &self.context
    }

    /// Recomputes the typing discipline from the match elements.
    pub fn policy_type(&self) -> PolicyType {
        let all_literal = self
            .subjects
            .iter()
            .chain(&self.actions)
            .chain(&self.resources)
            .all(Element::is_literal);
        if all_literal {
            PolicyType::StringBased
        } else {
            PolicyType::RuleBased
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses the canonical JSON form. Structural mismatches are
    /// serialization errors; a well-formed document with invalid semantics
    /// (e.g. a field mixing element shapes) is a validation error.
    pub fn from_json(json: &str) -> Result<Self> {
        let repr: PolicyRepr = serde_json::from_str(json)?;
        Policy::try_from(repr)
    }
}

/// Consuming builder for [`Policy`].
pub struct PolicyBuilder {
    uid: String,
    description: Option<String>,
    effect: Effect,
    subjects: Vec<Element>,
    actions: Vec<Element>,
    resources: Vec<Element>,
    context: BTreeMap<String, Rule>,
}

impl PolicyBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn subjects<I, E>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Element>,
    {
        self.subjects = elements.into_iter().map(Into::into).collect();
        self
    }

    pub fn actions<I, E>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Element>,
    {
        self.actions = elements.into_iter().map(Into::into).collect();
        self
    }

    pub fn resources<I, E>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Element>,
    {
        self.resources = elements.into_iter().map(Into::into).collect();
        self
    }

    pub fn context<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Rule)>,
        K: Into<String>,
    {
        self.context = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    pub fn build(self) -> Result<Policy> {
        let policy = Policy {
            uid: self.uid,
            description: self.description,
            effect: self.effect,
            subjects: self.subjects,
            actions: self.actions,
            resources: self.resources,
            context: self.context,
        };
        validate(&policy)?;
        Ok(policy)
    }
}

fn validate(policy: &Policy) -> Result<()> {
    for (name, elements) in [
        ("subjects", &policy.subjects),
        ("actions", &policy.actions),
        ("resources", &policy.resources),
    ] {
        let literals = elements.iter().filter(|e| e.is_literal()).count();
        if literals > 0 && literals < elements.len() {
            return Err(Error::Validation(format!(
                "policy field '{}' mixes literal and rule-based match elements",
                name
            )));
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct PolicyRepr {
    uid: Value,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "deny")]
    effect: Effect,
    #[serde(default)]
    subjects: Vec<Element>,
    #[serde(default)]
    actions: Vec<Element>,
    #[serde(default)]
    resources: Vec<Element>,
    #[serde(default)]
    context: BTreeMap<String, Rule>,
}

fn deny() -> Effect {
    Effect::Deny
}

impl From<Policy> for PolicyRepr {
    fn from(policy: Policy) -> Self {
        PolicyRepr {
            uid: Value::String(policy.uid),
            description: policy.description,
            effect: policy.effect,
            subjects: policy.subjects,
            actions: policy.actions,
            resources: policy.resources,
            context: policy.context,
        }
    }
}

impl TryFrom<PolicyRepr> for Policy {
    type Error = Error;

    fn try_from(repr: PolicyRepr) -> Result<Self> {
        // integer uids in transported documents canonicalize to their
        // decimal string form
        let uid = match repr.uid {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(Error::Serialization(
                    "policy uid must be a string or an integer".to_owned(),
                ))
            }
        };
        let policy = Policy {
            uid,
            description: repr.description,
            effect: repr.effect,
            subjects: repr.subjects,
            actions: repr.actions,
            resources: repr.resources,
            context: repr.context,
        };
        validate(&policy)?;
        Ok(policy)
    }
}
