//! String rules.

use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::errors::{Error, Result};

/// A compiled pattern with *search* semantics: the pattern may be found
/// anywhere in the candidate, unanchored. The full-string anchoring used by
/// the regex checker is a separate, deliberate asymmetry.
#[derive(Clone)]
pub struct SearchPattern(Regex);

impl SearchPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(SearchPattern)
            .map_err(|e| Error::Validation(format!("uncompilable regex pattern: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn is_match(&self, candidate: &str) -> bool {
        self.0.is_match(candidate)
    }
}

impl fmt::Debug for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SearchPattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for SearchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// `ci` comparisons lowercase both operands with `str::to_lowercase`.
/// That is Unicode lowercasing, not full case folding: fold-only mappings
/// such as `ß` → `ss` or dotless `ı` are not applied, so `"straße"` and
/// `"STRASSE"` stay distinct.
fn fold(s: &str, ci: bool) -> String {
    if ci {
        s.to_lowercase()
    } else {
        s.to_owned()
    }
}

pub(super) fn equal(what: &Value, val: &str, ci: bool) -> bool {
    match what {
        Value::String(s) => fold(s, ci) == fold(val, ci),
        _ => false,
    }
}

pub(super) fn starts_with(what: &Value, val: &str, ci: bool) -> bool {
    match what {
        Value::String(s) => fold(s, ci).starts_with(&fold(val, ci)),
        _ => false,
    }
}

pub(super) fn ends_with(what: &Value, val: &str, ci: bool) -> bool {
    match what {
        Value::String(s) => fold(s, ci).ends_with(&fold(val, ci)),
        _ => false,
    }
}

pub(super) fn contains(what: &Value, val: &str, ci: bool) -> bool {
    match what {
        Value::String(s) => fold(s, ci).contains(&fold(val, ci)),
        _ => false,
    }
}

pub(super) fn search(what: &Value, pattern: &SearchPattern) -> bool {
    match what {
        Value::String(s) => pattern.is_match(s),
        _ => false,
    }
}

/// Satisfied by a (possibly empty) sequence of two-element sequences of
/// equal strings.
pub(super) fn pairs_equal(what: &Value) -> bool {
    match what {
        Value::Array(pairs) => pairs.iter().all(|pair| match pair {
            Value::Array(items) => match items.as_slice() {
                [Value::String(a), Value::String(b)] => a == b,
                _ => false,
            },
            _ => false,
        }),
        _ => false,
    }
}
