//! The rule algebra: small composable predicates over a single value.
//!
//! A [`Rule`] answers one question, [`Rule::satisfied`], and never mutates
//! state. Type mismatches between a rule and the candidate value are not
//! errors; the rule is simply not satisfied. Rules serialize to the
//! canonical `{"type": ..., "contents": ...}` JSON form.

mod codec;
mod compare;
mod inquiry;
mod list;
mod logic;
mod net;
mod string;

use serde_json::Value;

use crate::errors::Result;
use crate::Inquiry;

pub(crate) use codec::looks_like_rule;
pub use net::CidrBlock;
pub use string::SearchPattern;

/// A predicate over a single value, optionally cross-referencing the
/// inquiry under decision.
///
/// Every kind of rule the engine knows is a variant here, grouped in six
/// families: comparison, logic, list membership, network, string, and the
/// legacy inquiry-related family.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    // Comparison.
    Eq(Value),
    NotEq(Value),
    Greater(Value),
    Less(Value),
    GreaterOrEqual(Value),
    LessOrEqual(Value),

    // Logic.
    Truthy,
    Falsy,
    Not(Box<Rule>),
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Any,
    Neither,

    // List membership.
    In(Vec<Value>),
    NotIn(Vec<Value>),
    AllIn(Vec<Value>),
    AllNotIn(Vec<Value>),
    AnyIn(Vec<Value>),
    AnyNotIn(Vec<Value>),

    // Network.
    Cidr(CidrBlock),

    // String.
    StrEqual { val: String, ci: bool },
    PairsEqual,
    RegexMatch(SearchPattern),
    StartsWith { val: String, ci: bool },
    EndsWith { val: String, ci: bool },
    Contains { val: String, ci: bool },

    // Inquiry-related (legacy family, kept for stored-data compatibility).
    SubjectEqual,
    ActionEqual,
    ResourceIn,
}

impl Rule {
    /// Decides whether the candidate value `what` satisfies this rule.
    ///
    /// `inquiry` is the request currently under decision; only the
    /// inquiry-related family looks at it, and without it those rules are
    /// not satisfied.
    pub fn satisfied(&self, what: &Value, inquiry: Option<&Inquiry>) -> bool {
        match self {
            Rule::Eq(val) => compare::eq(what, val),
            Rule::NotEq(val) => !compare::eq(what, val),
            Rule::Greater(val) => compare::ordered(what, val, |o| o.is_gt()),
            Rule::Less(val) => compare::ordered(what, val, |o| o.is_lt()),
            Rule::GreaterOrEqual(val) => compare::ordered(what, val, |o| o.is_ge()),
            Rule::LessOrEqual(val) => compare::ordered(what, val, |o| o.is_le()),

            Rule::Truthy => logic::truthy(what),
            Rule::Falsy => !logic::truthy(what),
            Rule::Not(rule) => !rule.satisfied(what, inquiry),
            Rule::And(rules) => rules.iter().all(|r| r.satisfied(what, inquiry)),
            Rule::Or(rules) => rules.iter().any(|r| r.satisfied(what, inquiry)),
            Rule::Any => true,
            Rule::Neither => false,

            Rule::In(vals) => list::contains(vals, what),
            Rule::NotIn(vals) => !list::contains(vals, what),
            Rule::AllIn(vals) => list::all_in(vals, what),
            Rule::AllNotIn(vals) => list::all_not_in(vals, what),
            Rule::AnyIn(vals) => list::any_in(vals, what),
            Rule::AnyNotIn(vals) => list::any_not_in(vals, what),

            Rule::Cidr(block) => net::within(block, what),

            Rule::StrEqual { val, ci } => string::equal(what, val, *ci),
            Rule::PairsEqual => string::pairs_equal(what),
            Rule::RegexMatch(pattern) => string::search(what, pattern),
            Rule::StartsWith { val, ci } => string::starts_with(what, val, *ci),
            Rule::EndsWith { val, ci } => string::ends_with(what, val, *ci),
            Rule::Contains { val, ci } => string::contains(what, val, *ci),

            Rule::SubjectEqual => inquiry::subject_equal(what, inquiry),
            Rule::ActionEqual => inquiry::action_equal(what, inquiry),
            Rule::ResourceIn => inquiry::resource_in(what, inquiry),
        }
    }

    pub fn eq(val: impl Into<Value>) -> Self {
        Rule::Eq(val.into())
    }

    pub fn not_eq(val: impl Into<Value>) -> Self {
        Rule::NotEq(val.into())
    }

    pub fn greater(val: impl Into<Value>) -> Self {
        Rule::Greater(val.into())
    }

    pub fn less(val: impl Into<Value>) -> Self {
        Rule::Less(val.into())
    }

    pub fn greater_or_equal(val: impl Into<Value>) -> Self {
        Rule::GreaterOrEqual(val.into())
    }

    pub fn less_or_equal(val: impl Into<Value>) -> Self {
        Rule::LessOrEqual(val.into())
    }

    pub fn not(rule: Rule) -> Self {
        Rule::Not(Box::new(rule))
    }

    pub fn and(rules: impl IntoIterator<Item = Rule>) -> Self {
        Rule::And(rules.into_iter().collect())
    }

    pub fn or(rules: impl IntoIterator<Item = Rule>) -> Self {
        Rule::Or(rules.into_iter().collect())
    }

    /// A rule satisfied by strings inside the given CIDR block.
    ///
    /// Fails with a validation error when `cidr` is not a well-formed
    /// IPv4/IPv6 network in `address/prefix` notation.
    pub fn cidr(cidr: &str) -> Result<Self> {
        Ok(Rule::Cidr(CidrBlock::parse(cidr)?))
    }

    /// A rule satisfied by strings the given pattern is found in.
    ///
    /// The pattern is compiled once, here; an uncompilable pattern is a
    /// validation error. Matching is a *search*, not a full match.
    pub fn regex_match(pattern: &str) -> Result<Self> {
        Ok(Rule::RegexMatch(SearchPattern::new(pattern)?))
    }

    pub fn str_equal(val: impl Into<String>) -> Self {
        Rule::StrEqual {
            val: val.into(),
            ci: false,
        }
    }

    pub fn starts_with(val: impl Into<String>) -> Self {
        Rule::StartsWith {
            val: val.into(),
            ci: false,
        }
    }

    pub fn ends_with(val: impl Into<String>) -> Self {
        Rule::EndsWith {
            val: val.into(),
            ci: false,
        }
    }

    pub fn contains(val: impl Into<String>) -> Self {
        Rule::Contains {
            val: val.into(),
            ci: false,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
