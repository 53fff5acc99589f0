#![deny(rust_2018_idioms, warnings)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

//! Attribute-based access control: policies, a rule algebra, pluggable
//! matching strategies and policy storages, composed by a [`Guard`] that
//! answers allow/deny for an [`Inquiry`].
//!
//! Aggregation is deny-overrides with a default deny: an inquiry is allowed
//! only when at least one stored policy matches it and none of the matching
//! policies denies.

mod cache;
mod checker;
mod effect;
mod errors;
mod guard;
mod inquiry;
mod policy;
mod rules;
mod storage;

pub use crate::cache::CachedStorage;
pub use crate::checker::{
    Checker, CheckerKind, RegexChecker, RulesChecker, StringExactChecker, StringFuzzyChecker,
};
pub use crate::effect::{Effect, ALLOW_ACCESS, DENY_ACCESS};
pub use crate::errors::{Error, Result};
pub use crate::guard::Guard;
pub use crate::inquiry::Inquiry;
pub use crate::policy::{AttrMatch, Element, Policy, PolicyBuilder, PolicyType};
pub use crate::rules::{CidrBlock, Rule, SearchPattern};
pub use crate::storage::document::{
    DocumentBackend, DocumentFilter, DocumentMigrationSet, DocumentStorage, FieldMatch,
    FieldPredicate, MemoryBackend, DEFAULT_COLLECTION, DEFAULT_MIGRATION_COLLECTION,
};
pub use crate::storage::memory::MemoryStorage;
pub use crate::storage::migration::{Migration, MigrationSet, Migrator};
pub use crate::storage::Storage;
