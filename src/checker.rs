//! Matching strategies deciding whether a policy fits an inquiry.
//!
//! A policy matches when all four of its fields match: `subjects`,
//! `actions` and `resources` match if *any* of their elements matches the
//! corresponding inquiry value, while `context` matches if *every* policy
//! context rule is satisfied by the inquiry context. An empty element
//! sequence therefore never matches; an empty context always does.
//!
//! Checker/policy compatibility is a hard invariant: the string-based
//! checkers never match a rule-based policy and [`RulesChecker`] never
//! matches a string-based one. Incompatible pairings quietly do not match.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use tracing::error;

use crate::policy::{AttrMatch, Element, Policy, PolicyType};
use crate::Inquiry;

const DEFAULT_CACHE_SIZE: usize = 1024;
const DEFAULT_START_TAG: char = '<';
const DEFAULT_END_TAG: char = '>';

/// Query-path hint a storage uses to pre-filter candidates without
/// downcasting the checker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CheckerKind {
    Exact,
    Fuzzy,
    Regex,
    Rules,
}

/// Strategy deciding whether a [`Policy`] matches an [`Inquiry`].
pub trait Checker {
    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool;

    /// The storage query-path hint for this strategy.
    fn hint(&self) -> CheckerKind;
}

fn context_matches(policy: &Policy, inquiry: &Inquiry) -> bool {
    policy.context().iter().all(|(key, rule)| {
        inquiry
            .context
            .get(key)
            .map_or(false, |value| rule.satisfied(value, Some(inquiry)))
    })
}

/// OR over literal elements; non-string inquiry values never match a
/// string-based field.
fn literal_field_matches(
    elements: &[Element],
    value: &Value,
    compare: impl Fn(&str, &str) -> bool,
) -> bool {
    let candidate = match value {
        Value::String(s) => s,
        _ => return false,
    };
    elements.iter().any(|element| match element {
        Element::Literal(lit) => compare(candidate, lit),
        _ => false,
    })
}

fn string_fits(
    policy: &Policy,
    inquiry: &Inquiry,
    compare: impl Fn(&str, &str) -> bool + Copy,
) -> bool {
    policy.policy_type() == PolicyType::StringBased
        && literal_field_matches(policy.subjects(), &inquiry.subject, compare)
        && literal_field_matches(policy.actions(), &inquiry.action, compare)
        && literal_field_matches(policy.resources(), &inquiry.resource, compare)
        && context_matches(policy, inquiry)
}

/// Literal string equality, case-sensitive.
#[derive(Debug, Default)]
pub struct StringExactChecker;

impl Checker for StringExactChecker {
    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool {
        string_fits(policy, inquiry, |candidate, lit| candidate == lit)
    }

    fn hint(&self) -> CheckerKind {
        CheckerKind::Exact
    }
}

/// Substring containment, case-sensitive: the inquiry value must occur
/// within the policy element.
#[derive(Debug, Default)]
pub struct StringFuzzyChecker;

impl Checker for StringFuzzyChecker {
    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool {
        string_fits(policy, inquiry, |candidate, lit| lit.contains(candidate))
    }

    fn hint(&self) -> CheckerKind {
        CheckerKind::Fuzzy
    }
}

/// Matches policy elements carrying regex segments between delimiter tags.
///
/// An element without the start tag degrades to exact string equality.
/// Otherwise the element is compiled into a full-string pattern (literal
/// parts escaped, tagged parts taken verbatim) and memoized in a bounded
/// LRU keyed by the raw element. A broken element (unbalanced tags or an
/// uncompilable segment) is logged and simply does not match.
pub struct RegexChecker {
    cache: Mutex<LruCache<String, Regex>>,
    start_tag: char,
    end_tag: char,
}

impl RegexChecker {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            start_tag: DEFAULT_START_TAG,
            end_tag: DEFAULT_END_TAG,
        }
    }

    /// Overrides the regex delimiter tags. Tags are checker-side
    /// configuration; stored policies do not record them.
    pub fn with_tags(mut self, start_tag: char, end_tag: char) -> Self {
        self.start_tag = start_tag;
        self.end_tag = end_tag;
        self
    }

    fn element_matches(&self, element: &str, candidate: &str) -> bool {
        if !element.contains(self.start_tag) {
            return element == candidate;
        }

        let mut cache = self.cache.lock();
        if let Some(pattern) = cache.get(element) {
            return pattern.is_match(candidate);
        }
        match compile_element(element, self.start_tag, self.end_tag) {
            Ok(pattern) => {
                let matched = pattern.is_match(candidate);
                cache.put(element.to_owned(), pattern);
                matched
            }
            Err(reason) => {
                error!(element, %reason, "skipping unmatchable policy element");
                false
            }
        }
    }
}

impl Default for RegexChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for RegexChecker {
    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool {
        string_fits(policy, inquiry, |candidate, element| {
            self.element_matches(element, candidate)
        })
    }

    fn hint(&self) -> CheckerKind {
        CheckerKind::Regex
    }
}

/// Compiles a tagged element into a full-string anchored pattern.
///
/// Unlike the `RegexMatch` rule, which searches, the checker demands the
/// whole inquiry value to match the element.
fn compile_element(element: &str, start_tag: char, end_tag: char) -> Result<Regex, String> {
    let unbalanced = || format!("element '{}' has unbalanced delimiter tags", element);

    let mut pattern = String::from("^");
    let mut literal = String::new();
    let mut expr = String::new();
    let mut depth = 0u32;

    for ch in element.chars() {
        if depth > 0 && ch == end_tag {
            depth -= 1;
            if depth == 0 {
                pattern.push('(');
                pattern.push_str(&expr);
                pattern.push(')');
                expr.clear();
            } else {
                expr.push(ch);
            }
        } else if ch == start_tag {
            depth += 1;
            if depth == 1 {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
            } else {
                expr.push(ch);
            }
        } else if depth > 0 {
            expr.push(ch);
        } else {
            literal.push(ch);
        }
    }
    if depth != 0 {
        return Err(unbalanced());
    }
    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');

    Regex::new(&pattern).map_err(|e| e.to_string())
}

/// Matches rule-based policies: bare rules run against the scalar inquiry
/// value, attribute mappings require every policy attribute to be present
/// in the inquiry mapping and satisfied.
#[derive(Debug, Default)]
pub struct RulesChecker;

fn rule_field_matches(elements: &[Element], value: &Value, inquiry: &Inquiry) -> bool {
    elements.iter().any(|element| match element {
        Element::Atom(rule) => rule.satisfied(value, Some(inquiry)),
        Element::Object(attrs) => match value {
            Value::Object(map) => attrs.iter().all(|(key, attr)| {
                map.get(key).map_or(false, |candidate| match attr {
                    AttrMatch::Literal(s) => candidate.as_str() == Some(s.as_str()),
                    AttrMatch::Rule(rule) => rule.satisfied(candidate, Some(inquiry)),
                })
            }),
            _ => false,
        },
        Element::Literal(_) => false,
    })
}

impl Checker for RulesChecker {
    fn fits(&self, policy: &Policy, inquiry: &Inquiry) -> bool {
        policy.policy_type() == PolicyType::RuleBased
            && rule_field_matches(policy.subjects(), &inquiry.subject, inquiry)
            && rule_field_matches(policy.actions(), &inquiry.action, inquiry)
            && rule_field_matches(policy.resources(), &inquiry.resource, inquiry)
            && context_matches(policy, inquiry)
    }

    fn hint(&self) -> CheckerKind {
        CheckerKind::Rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Effect, Rule};
    use serde_json::json;

    fn library_policy() -> Policy {
        Policy::builder("s4")
            .effect(Effect::Allow)
            .subjects([r"<[\w]+ M[\w]+>"])
            .actions(["<read|get>"])
            .resources(["library:books:<.+>"])
            .context([("ip", Rule::cidr("192.168.2.0/24").unwrap())])
            .build()
            .unwrap()
    }

    fn library_inquiry() -> Inquiry {
        Inquiry::new("John Miller", "read", "library:books:001")
            .with_context([("ip", json!("192.168.2.17"))])
    }

    #[test]
    fn exact_checker_matches_literally() {
        let policy = Policy::builder("1")
            .effect(Effect::Allow)
            .subjects(["Max"])
            .actions(["update"])
            .resources(["books"])
            .build()
            .unwrap();

        let checker = StringExactChecker;
        assert!(checker.fits(&policy, &Inquiry::new("Max", "update", "books")));
        assert!(!checker.fits(&policy, &Inquiry::new("max", "update", "books")));
        assert!(!checker.fits(&policy, &Inquiry::new("Max", "update", "book")));
    }

    #[test]
    fn fuzzy_checker_contains_the_inquiry_value() {
        let policy = Policy::builder("1")
            .effect(Effect::Allow)
            .subjects(["Maxim"])
            .actions(["update"])
            .resources(["library:books:001"])
            .build()
            .unwrap();

        let checker = StringFuzzyChecker;
        assert!(checker.fits(&policy, &Inquiry::new("Max", "update", "books")));
        assert!(checker.fits(&policy, &Inquiry::new("Maxim", "date", "books:001")));
        assert!(!checker.fits(&policy, &Inquiry::new("Maxims", "update", "books")));
    }

    #[test]
    fn regex_checker_matches_tagged_elements() {
        let checker = RegexChecker::new();
        assert!(checker.fits(&library_policy(), &library_inquiry()));
    }

    #[test]
    fn regex_checker_requires_full_match() {
        let checker = RegexChecker::new();
        let policy = Policy::builder("1")
            .effect(Effect::Allow)
            .subjects([r"<[\d]+>"])
            .actions(["update"])
            .resources(["r"])
            .build()
            .unwrap();

        assert!(checker.fits(&policy, &Inquiry::new("123", "update", "r")));
        // a substring hit is not enough
        assert!(!checker.fits(&policy, &Inquiry::new("a123", "update", "r")));
    }

    #[test]
    fn regex_checker_degrades_untagged_elements_to_equality() {
        let checker = RegexChecker::new();
        let policy = Policy::builder("1")
            .effect(Effect::Allow)
            .subjects(["Max"])
            .actions(["update"])
            .resources(["r"])
            .build()
            .unwrap();

        assert!(checker.fits(&policy, &Inquiry::new("Max", "update", "r")));
        assert!(!checker.fits(&policy, &Inquiry::new("Maxim", "update", "r")));
    }

    #[test]
    fn regex_checker_memoizes_compiled_elements() {
        let checker = RegexChecker::with_cache_size(8);
        let inquiry = library_inquiry();
        for _ in 0..3 {
            assert!(checker.fits(&library_policy(), &inquiry));
        }
        // one compiled pattern per tagged element, however many decisions
        assert_eq!(3, checker.cache.lock().len());
    }

    #[test]
    fn regex_checker_supports_custom_tags() {
        let checker = RegexChecker::new().with_tags('=', '=');
        let policy = Policy::builder("1")
            .effect(Effect::Allow)
            .subjects([r"=[FGH]+[\w]+="])
            .actions(["read"])
            .resources(["r"])
            .build()
            .unwrap();

        assert!(checker.fits(&policy, &Inquiry::new("Fred", "read", "r")));
        assert!(!checker.fits(&policy, &Inquiry::new("Max", "read", "r")));
    }

    #[test]
    fn unbalanced_tags_do_not_match_and_do_not_panic() {
        let checker = RegexChecker::new();
        let policy = Policy::builder("1")
            .effect(Effect::Allow)
            .subjects(["<[\\w]+"])
            .actions(["read"])
            .resources(["r"])
            .build()
            .unwrap();

        assert!(!checker.fits(&policy, &Inquiry::new("John", "read", "r")));
    }

    #[test]
    fn rules_checker_matches_atoms_and_objects() {
        let policy = Policy::builder("s1")
            .effect(Effect::Allow)
            .subjects([Element::object([
                ("name", Rule::Any.into()),
                (
                    "stars",
                    Rule::and([Rule::greater(50), Rule::less(999)]).into(),
                ),
            ])])
            .actions([Rule::eq("fork"), Rule::eq("clone")])
            .resources([Rule::StartsWith {
                val: "repos/Google".into(),
                ci: true,
            }])
            .context([("referer", Rule::eq("https://github.com"))])
            .build()
            .unwrap();

        let checker = RulesChecker;
        let inquiry = Inquiry::new(
            json!({"name": "larry", "stars": 80}),
            "fork",
            "repos/google/tensorflow",
        )
        .with_context([("referer", "https://github.com")]);
        assert!(checker.fits(&policy, &inquiry));

        // attribute out of range
        let poor = Inquiry::new(json!({"name": "larry", "stars": 40}), "fork", "repos/google/x")
            .with_context([("referer", "https://github.com")]);
        assert!(!checker.fits(&policy, &poor));

        // attribute missing from the inquiry mapping
        let anonymous = Inquiry::new(json!({"stars": 80}), "fork", "repos/google/x")
            .with_context([("referer", "https://github.com")]);
        assert!(!checker.fits(&policy, &anonymous));

        // scalar where the policy expects a mapping
        let scalar = Inquiry::new("larry", "fork", "repos/google/x")
            .with_context([("referer", "https://github.com")]);
        assert!(!checker.fits(&policy, &scalar));
    }

    #[test]
    fn checkers_reject_the_other_discipline() {
        let string_policy = library_policy();
        let rule_policy = Policy::builder("6")
            .effect(Effect::Allow)
            .subjects([Rule::eq("Nina")])
            .actions([Rule::eq("read")])
            .resources([Rule::Any])
            .build()
            .unwrap();

        let inquiry = library_inquiry();
        assert!(!RulesChecker.fits(&string_policy, &inquiry));

        let nina = Inquiry::new("Nina", "read", "r");
        assert!(RulesChecker.fits(&rule_policy, &nina));
        assert!(!StringExactChecker.fits(&rule_policy, &nina));
        assert!(!StringFuzzyChecker.fits(&rule_policy, &nina));
        assert!(!RegexChecker::new().fits(&rule_policy, &nina));
    }

    #[test]
    fn missing_context_key_never_matches() {
        let checker = RegexChecker::new();
        let inquiry = Inquiry::new("John Miller", "read", "library:books:001");
        assert!(!checker.fits(&library_policy(), &inquiry));

        // a misspelled key is as good as a missing one
        let misspelled = Inquiry::new("John Miller", "read", "library:books:001")
            .with_context([("IP", json!("192.168.2.17"))]);
        assert!(!checker.fits(&library_policy(), &misspelled));
    }

    #[test]
    fn empty_fields_never_match_but_empty_context_does() {
        let empty = Policy::builder("4").effect(Effect::Allow).build().unwrap();
        assert!(!StringExactChecker.fits(&empty, &Inquiry::default()));
        assert!(!RegexChecker::new().fits(&empty, &Inquiry::default()));

        // context-free policy with populated fields
        let policy = Policy::builder("2")
            .effect(Effect::Allow)
            .subjects(["Max"])
            .actions(["update"])
            .resources(["r"])
            .build()
            .unwrap();
        assert!(StringExactChecker.fits(&policy, &Inquiry::new("Max", "update", "r")));
    }

    #[test]
    fn context_rules_may_reference_the_inquiry() {
        let policy = Policy::builder("1")
            .effect(Effect::Allow)
            .subjects(["Nina"])
            .actions(["delete"])
            .resources(["r1"])
            .context([("owner", Rule::SubjectEqual)])
            .build()
            .unwrap();

        let checker = StringExactChecker;
        let own = Inquiry::new("Nina", "delete", "r1").with_context([("owner", json!("Nina"))]);
        assert!(checker.fits(&policy, &own));

        let foreign = Inquiry::new("Nina", "delete", "r1").with_context([("owner", json!("Ben"))]);
        assert!(!checker.fits(&policy, &foreign));
    }
}
