//! Storage adapter for document databases.
//!
//! Real drivers stay out of the crate: the adapter is written against the
//! small [`DocumentBackend`] capability, and [`MemoryBackend`] is the
//! in-process reference implementation. Each policy becomes one document:
//! its canonical JSON plus a computed `type` marker used for query
//! pre-filtering.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::checker::CheckerKind;
use crate::errors::{Error, Result};
use crate::policy::PolicyType;
use crate::storage::migration::{Migration, MigrationSet};
use crate::storage::Storage;
use crate::{Inquiry, Policy};

pub const DEFAULT_COLLECTION: &str = "warden_policies";
pub const DEFAULT_MIGRATION_COLLECTION: &str = "warden_policies_migration_version";

const TYPE_FIELD: &str = "type";
const CONDITION_FIELDS: [&str; 3] = ["subjects", "actions", "resources"];

/// How a scan predicate compares stored elements to the probe value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    /// Some element equals the value.
    Equal,
    /// Some element contains the value as a substring.
    Contains,
}

/// One per-field predicate of a [`DocumentFilter`].
#[derive(Debug, Clone)]
pub struct FieldPredicate {
    pub field: String,
    pub mode: FieldMatch,
    pub value: String,
}

/// Backend-neutral scan filter. A driver translates it into its native
/// query language; [`MemoryBackend`] interprets it directly.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub policy_type: Option<PolicyType>,
    pub conditions: Vec<FieldPredicate>,
}

impl DocumentFilter {
    /// The unrestricted filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Reference semantics of the filter against a stored document.
    pub fn matches(&self, doc: &Value) -> bool {
        if let Some(policy_type) = self.policy_type {
            if doc.get(TYPE_FIELD).and_then(Value::as_str) != Some(policy_type.as_str()) {
                return false;
            }
        }
        self.conditions.iter().all(|predicate| {
            doc.get(&predicate.field)
                .and_then(Value::as_array)
                .map_or(false, |elements| {
                    elements
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|element| match predicate.mode {
                            FieldMatch::Equal => element == predicate.value,
                            FieldMatch::Contains => element.contains(&predicate.value),
                        })
                })
        })
    }
}

/// The capability a document database must offer to host policies:
/// id-keyed document CRUD within named collections, a filtered scan, and
/// index management.
///
/// `insert` fails with [`Error::PolicyExists`] on an occupied id;
/// `replace` and `delete` fail with [`Error::PolicyNotFound`] on a missing
/// one. Scans return documents in stable id order.
pub trait DocumentBackend {
    fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<()>;
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;
    fn replace(&self, collection: &str, id: &str, doc: Value) -> Result<()>;
    fn delete(&self, collection: &str, id: &str) -> Result<()>;
    fn scan(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>>;
    fn create_index(&self, collection: &str, field: &str, name: &str) -> Result<()>;
    fn drop_index(&self, collection: &str, name: &str) -> Result<()>;
}

/// In-process [`DocumentBackend`]: collections are ordered id → document
/// maps. Doubles as the test double and as reference semantics for driver
/// authors. Index bookkeeping is nominal; scans are not accelerated.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
    indexes: RwLock<BTreeSet<(String, String)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_index(&self, collection: &str, name: &str) -> bool {
        self.indexes
            .read()
            .contains(&(collection.to_owned(), name.to_owned()))
    }
}

impl DocumentBackend for MemoryBackend {
    fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_owned()).or_default();
        if docs.contains_key(id) {
            return Err(Error::PolicyExists(id.to_owned()));
        }
        docs.insert(id.to_owned(), doc);
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn replace(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_owned()).or_default();
        match docs.get_mut(id) {
            Some(stored) => {
                *stored = doc;
                Ok(())
            }
            None => Err(Error::PolicyNotFound(id.to_owned())),
        }
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_owned()).or_default();
        match docs.remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::PolicyNotFound(id.to_owned())),
        }
    }

    fn scan(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .skip(offset)
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn create_index(&self, collection: &str, _field: &str, name: &str) -> Result<()> {
        let mut indexes = self.indexes.write();
        if !indexes.insert((collection.to_owned(), name.to_owned())) {
            return Err(Error::Backend(format!("index {} already exists", name)));
        }
        Ok(())
    }

    fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        let mut indexes = self.indexes.write();
        if !indexes.remove(&(collection.to_owned(), name.to_owned())) {
            return Err(Error::Backend(format!("no index named {}", name)));
        }
        Ok(())
    }
}

/// [`Storage`] over a [`DocumentBackend`], one document per policy in a
/// configurable collection.
#[derive(Debug)]
pub struct DocumentStorage<B> {
    backend: B,
    collection: String,
}

impl<B: DocumentBackend> DocumentStorage<B> {
    pub fn new(backend: B) -> Self {
        Self::with_collection(backend, DEFAULT_COLLECTION)
    }

    pub fn with_collection(backend: B, collection: impl Into<String>) -> Self {
        Self {
            backend,
            collection: collection.into(),
        }
    }

    fn to_doc(policy: &Policy) -> Result<Value> {
        let mut doc = serde_json::to_value(policy)?;
        // the computed discipline is stamped onto the stored form only
        doc[TYPE_FIELD] = Value::String(policy.policy_type().as_str().to_owned());
        Ok(doc)
    }

    fn from_doc(doc: Value) -> Result<Policy> {
        let mut doc = match doc {
            Value::Object(map) => map,
            _ => {
                return Err(Error::Serialization(
                    "a stored policy must be a JSON object".to_owned(),
                ))
            }
        };
        doc.remove(TYPE_FIELD);
        Ok(serde_json::from_value(Value::Object(doc))?)
    }

    fn query_for(inquiry: &Inquiry, hint: CheckerKind) -> DocumentFilter {
        let string_conditions = |mode: FieldMatch| {
            let probes = [
                ("subjects", &inquiry.subject),
                ("actions", &inquiry.action),
                ("resources", &inquiry.resource),
            ];
            probes
                .into_iter()
                .filter_map(|(field, value)| {
                    // non-string inquiry values cannot narrow a string field
                    value.as_str().map(|value| FieldPredicate {
                        field: field.to_owned(),
                        mode,
                        value: value.to_owned(),
                    })
                })
                .collect()
        };

        match hint {
            CheckerKind::Exact => DocumentFilter {
                policy_type: Some(PolicyType::StringBased),
                conditions: string_conditions(FieldMatch::Equal),
            },
            CheckerKind::Fuzzy => DocumentFilter {
                policy_type: Some(PolicyType::StringBased),
                conditions: string_conditions(FieldMatch::Contains),
            },
            CheckerKind::Regex => DocumentFilter {
                policy_type: Some(PolicyType::StringBased),
                conditions: Vec::new(),
            },
            CheckerKind::Rules => DocumentFilter {
                policy_type: Some(PolicyType::RuleBased),
                conditions: Vec::new(),
            },
        }
    }
}

impl<B: DocumentBackend> Storage for DocumentStorage<B> {
    fn add(&self, policy: Policy) -> Result<()> {
        let doc = Self::to_doc(&policy)?;
        self.backend.insert(&self.collection, policy.uid(), doc)?;
        info!(uid = policy.uid(), "added policy");
        Ok(())
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>> {
        match self.backend.get(&self.collection, uid)? {
            Some(doc) => Ok(Some(Self::from_doc(doc)?)),
            None => Ok(None),
        }
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        self.backend
            .scan(&self.collection, &DocumentFilter::all(), Some(limit), offset)?
            .into_iter()
            .map(Self::from_doc)
            .collect()
    }

    fn update(&self, policy: Policy) -> Result<()> {
        let doc = Self::to_doc(&policy)?;
        self.backend.replace(&self.collection, policy.uid(), doc)?;
        info!(uid = policy.uid(), "updated policy");
        Ok(())
    }

    fn delete(&self, uid: &str) -> Result<()> {
        self.backend.delete(&self.collection, uid)?;
        info!(uid, "deleted policy");
        Ok(())
    }

    fn find_for_inquiry(&self, inquiry: &Inquiry, hint: CheckerKind) -> Result<Vec<Policy>> {
        let filter = Self::query_for(inquiry, hint);
        let docs = self.backend.scan(&self.collection, &filter, None, 0)?;
        docs.into_iter()
            .map(|doc| {
                Self::from_doc(doc).map_err(|err| {
                    error!(error = %err, "stored policy document failed to decode");
                    err
                })
            })
            .collect()
    }
}

//
// Migrations
//

const LEGACY_RULE_NAMES: [(&str, &str); 7] = [
    (
        "warden.conditions.string.StringEqualCondition",
        "warden.rules.string.StrEqual",
    ),
    (
        "warden.conditions.string.RegexMatchCondition",
        "warden.rules.string.RegexMatch",
    ),
    (
        "warden.conditions.string.StringPairsEqualCondition",
        "warden.rules.string.PairsEqual",
    ),
    ("warden.conditions.net.CIDRCondition", "warden.rules.net.CIDR"),
    (
        "warden.conditions.inquiry.SubjectEqualCondition",
        "warden.rules.inquiry.SubjectEqual",
    ),
    (
        "warden.conditions.inquiry.ActionEqualCondition",
        "warden.rules.inquiry.ActionEqual",
    ),
    (
        "warden.conditions.inquiry.ResourceInCondition",
        "warden.rules.inquiry.ResourceIn",
    ),
];

/// Migrations for a [`DocumentStorage`], with the applied number persisted
/// as a single document in a side collection.
pub struct DocumentMigrationSet<'a, B> {
    storage: &'a DocumentStorage<B>,
    collection: String,
}

const VERSION_DOC_ID: &str = "migration_version";
const VERSION_KEY: &str = "version";

impl<'a, B: DocumentBackend> DocumentMigrationSet<'a, B> {
    pub fn new(storage: &'a DocumentStorage<B>) -> Self {
        Self::with_collection(storage, DEFAULT_MIGRATION_COLLECTION)
    }

    pub fn with_collection(storage: &'a DocumentStorage<B>, collection: impl Into<String>) -> Self {
        Self {
            storage,
            collection: collection.into(),
        }
    }
}

impl<B: DocumentBackend> MigrationSet for DocumentMigrationSet<'_, B> {
    fn migrations(&self) -> Vec<Box<dyn Migration + '_>> {
        vec![
            Box::new(ConditionIndexes {
                storage: self.storage,
            }),
            Box::new(LegacyConditionSchema {
                storage: self.storage,
            }),
        ]
    }

    fn last_applied(&self) -> Result<u32> {
        let doc = self
            .storage
            .backend
            .get(&self.collection, VERSION_DOC_ID)?;
        Ok(doc
            .and_then(|doc| doc.get(VERSION_KEY).and_then(Value::as_u64))
            .unwrap_or(0) as u32)
    }

    fn save_applied_number(&self, number: u32) -> Result<()> {
        let doc = json!({ VERSION_KEY: number });
        if self
            .storage
            .backend
            .get(&self.collection, VERSION_DOC_ID)?
            .is_some()
        {
            self.storage
                .backend
                .replace(&self.collection, VERSION_DOC_ID, doc)
        } else {
            self.storage
                .backend
                .insert(&self.collection, VERSION_DOC_ID, doc)
        }
    }
}

/// Order 1: multikey indexes over the condition fields.
struct ConditionIndexes<'a, B> {
    storage: &'a DocumentStorage<B>,
}

fn index_name(field: &str) -> String {
    format!("{}_idx", field)
}

impl<B: DocumentBackend> Migration for ConditionIndexes<'_, B> {
    fn order(&self) -> u32 {
        1
    }

    fn up(&self) -> Result<()> {
        for field in CONDITION_FIELDS {
            self.storage
                .backend
                .create_index(&self.storage.collection, field, &index_name(field))?;
        }
        Ok(())
    }

    fn down(&self) -> Result<()> {
        for field in CONDITION_FIELDS {
            self.storage
                .backend
                .drop_index(&self.storage.collection, &index_name(field))?;
        }
        Ok(())
    }
}

/// Order 2: the conditions→rules schema change.
///
/// Early policy documents carried a `rules` mapping of
/// `warden.conditions.*Condition` type tags and no `type` marker. Going up
/// renames the tags, moves `rules` to `context` and stamps the computed
/// discipline (plus its index). Down reverses, and reports itself
/// irreversible for documents that only the new schema can express.
struct LegacyConditionSchema<'a, B> {
    storage: &'a DocumentStorage<B>,
}

const TYPE_INDEX: &str = "type_idx";

impl<B: DocumentBackend> LegacyConditionSchema<'_, B> {
    /// Converts every document with `convert`, erroring before anything is
    /// written so a failing step leaves the collection fully pre-step.
    fn convert_all(
        &self,
        convert: impl Fn(Map<String, Value>) -> Result<Map<String, Value>>,
    ) -> Result<()> {
        let docs = self.storage.backend.scan(
            &self.storage.collection,
            &DocumentFilter::all(),
            None,
            0,
        )?;

        let mut converted = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc = match doc {
                Value::Object(map) => map,
                _ => return Err(Error::Migration("malformed policy document".to_owned())),
            };
            let id = match doc.get("uid") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return Err(Error::Migration("policy document without a uid".to_owned())),
            };
            converted.push((id, convert(doc)?));
        }

        for (id, doc) in converted {
            info!(uid = %id, "migrating policy document");
            self.storage
                .backend
                .replace(&self.storage.collection, &id, Value::Object(doc))?;
        }
        Ok(())
    }
}

fn rename_rule_type(rule: &mut Value, rename: impl Fn(&str) -> Option<String>) {
    if let Some(Value::String(kind)) = rule.get_mut("type") {
        if let Some(new) = rename(kind) {
            *kind = new;
        }
    }
}

fn stored_discipline(doc: &Map<String, Value>) -> PolicyType {
    let all_literal = CONDITION_FIELDS.iter().all(|field| {
        doc.get(*field)
            .and_then(Value::as_array)
            .map_or(true, |elements| elements.iter().all(Value::is_string))
    });
    if all_literal {
        PolicyType::StringBased
    } else {
        PolicyType::RuleBased
    }
}

impl<B: DocumentBackend> Migration for LegacyConditionSchema<'_, B> {
    fn order(&self) -> u32 {
        2
    }

    fn up(&self) -> Result<()> {
        self.convert_all(|mut doc| {
            if let Some(mut rules) = doc.remove("rules") {
                if let Some(map) = rules.as_object_mut() {
                    for rule in map.values_mut() {
                        rename_rule_type(rule, |kind| {
                            LEGACY_RULE_NAMES
                                .iter()
                                .find(|(legacy, _)| *legacy == kind)
                                .map(|(_, current)| (*current).to_owned())
                        });
                    }
                }
                doc.insert("context".to_owned(), rules);
            }
            let discipline = stored_discipline(&doc);
            doc.insert(
                TYPE_FIELD.to_owned(),
                Value::String(discipline.as_str().to_owned()),
            );
            Ok(doc)
        })?;
        self.storage
            .backend
            .create_index(&self.storage.collection, TYPE_FIELD, TYPE_INDEX)
    }

    fn down(&self) -> Result<()> {
        self.convert_all(|mut doc| {
            match doc.remove(TYPE_FIELD) {
                Some(Value::String(t)) if t == PolicyType::StringBased.as_str() => {}
                _ => {
                    return Err(Error::Irreversible(
                        "only string-based policies exist under the legacy schema".to_owned(),
                    ))
                }
            }
            if let Some(mut context) = doc.remove("context") {
                if let Some(map) = context.as_object_mut() {
                    for rule in map.values_mut() {
                        let kind = rule
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned();
                        let legacy = LEGACY_RULE_NAMES
                            .iter()
                            .find(|(_, current)| *current == kind)
                            .map(|(legacy, _)| (*legacy).to_owned());
                        match legacy {
                            Some(legacy) => rename_rule_type(rule, |_| Some(legacy.clone())),
                            // rule kinds born after the legacy schema
                            None if kind.starts_with("warden.rules.") => {
                                return Err(Error::Irreversible(format!(
                                    "rule kind {} has no legacy form",
                                    kind
                                )))
                            }
                            None => {}
                        }
                    }
                }
                doc.insert("rules".to_owned(), context);
            }
            Ok(doc)
        })?;
        self.storage
            .backend
            .drop_index(&self.storage.collection, TYPE_INDEX)
    }
}
