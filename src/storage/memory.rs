use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::info;

use crate::checker::CheckerKind;
use crate::errors::{Error, Result};
use crate::storage::Storage;
use crate::{Inquiry, Policy};

/// In-process storage: an ordered uid → policy map behind a reader-writer
/// lock. Decisions run lock-free of each other; writes serialize.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    policies: RwLock<BTreeMap<String, Policy>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn add(&self, policy: Policy) -> Result<()> {
        let mut policies = self.policies.write();
        if policies.contains_key(policy.uid()) {
            return Err(Error::PolicyExists(policy.uid().to_owned()));
        }
        info!(uid = policy.uid(), "added policy");
        policies.insert(policy.uid().to_owned(), policy);
        Ok(())
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>> {
        Ok(self.policies.read().get(uid).cloned())
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        Ok(self
            .policies
            .read()
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn update(&self, policy: Policy) -> Result<()> {
        let mut policies = self.policies.write();
        match policies.get_mut(policy.uid()) {
            Some(stored) => {
                info!(uid = policy.uid(), "updated policy");
                *stored = policy;
                Ok(())
            }
            None => Err(Error::PolicyNotFound(policy.uid().to_owned())),
        }
    }

    fn delete(&self, uid: &str) -> Result<()> {
        match self.policies.write().remove(uid) {
            Some(_) => {
                info!(uid, "deleted policy");
                Ok(())
            }
            None => Err(Error::PolicyNotFound(uid.to_owned())),
        }
    }

    fn find_for_inquiry(&self, _inquiry: &Inquiry, _hint: CheckerKind) -> Result<Vec<Policy>> {
        // no pre-filtering; the guard's checker does all the work
        Ok(self.policies.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Effect;
    use matches::assert_matches;

    fn policy(uid: &str) -> Policy {
        Policy::builder(uid)
            .effect(Effect::Allow)
            .subjects(["Max"])
            .actions(["get"])
            .resources(["book"])
            .build()
            .unwrap()
    }

    #[test]
    fn add_then_get_observes_the_policy() {
        let storage = MemoryStorage::new();
        storage.add(policy("1")).unwrap();
        let stored = storage.get("1").unwrap().unwrap();
        assert_eq!("1", stored.uid());
        assert_matches!(storage.get("2"), Ok(None));
    }

    #[test]
    fn duplicate_add_fails() {
        let storage = MemoryStorage::new();
        storage.add(policy("1")).unwrap();
        assert_matches!(storage.add(policy("1")), Err(Error::PolicyExists(_)));
    }

    #[test]
    fn get_all_pages_in_uid_order() {
        let storage = MemoryStorage::new();
        for uid in ["b", "a", "c"] {
            storage.add(policy(uid)).unwrap();
        }

        let uids = |policies: Vec<Policy>| {
            policies
                .iter()
                .map(|p| p.uid().to_owned())
                .collect::<Vec<_>>()
        };

        assert_eq!(vec!["a", "b", "c"], uids(storage.get_all(10, 0).unwrap()));
        assert_eq!(vec!["b", "c"], uids(storage.get_all(10, 1).unwrap()));
        assert_eq!(vec!["a", "b"], uids(storage.get_all(2, 0).unwrap()));
        assert!(storage.get_all(0, 0).unwrap().is_empty());
        assert!(storage.get_all(10, 5).unwrap().is_empty());
    }

    #[test]
    fn update_replaces_by_uid() {
        let storage = MemoryStorage::new();
        storage.add(policy("1")).unwrap();

        let replacement = Policy::builder("1")
            .effect(Effect::Deny)
            .subjects(["Max"])
            .actions(["get"])
            .resources(["book"])
            .build()
            .unwrap();
        storage.update(replacement).unwrap();
        assert_eq!(Effect::Deny, storage.get("1").unwrap().unwrap().effect());

        assert_matches!(storage.update(policy("9")), Err(Error::PolicyNotFound(_)));
    }

    #[test]
    fn delete_removes_or_fails() {
        let storage = MemoryStorage::new();
        storage.add(policy("1")).unwrap();
        storage.delete("1").unwrap();
        assert_matches!(storage.get("1"), Ok(None));
        assert_matches!(storage.delete("1"), Err(Error::PolicyNotFound(_)));
    }

    #[test]
    fn find_for_inquiry_returns_everything() {
        let storage = MemoryStorage::new();
        storage.add(policy("1")).unwrap();
        storage.add(policy("2")).unwrap();

        let inquiry = Inquiry::new("nobody", "nothing", "nowhere");
        for hint in [
            CheckerKind::Exact,
            CheckerKind::Fuzzy,
            CheckerKind::Regex,
            CheckerKind::Rules,
        ] {
            assert_eq!(2, storage.find_for_inquiry(&inquiry, hint).unwrap().len());
        }
    }
}
