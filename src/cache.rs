use tracing::info;

use crate::checker::CheckerKind;
use crate::errors::{Error, Result};
use crate::storage::Storage;
use crate::{Inquiry, Policy};

/// Write-through cache over a primary storage.
///
/// Wraps a slow primary (typically a [`DocumentStorage`]) with a fast cache
/// storage (typically a [`MemoryStorage`]) and is itself a [`Storage`]:
/// writes land on the primary first and then mirror into the cache, reads
/// are served from the cache and fall back to the primary when it comes up
/// empty.
///
/// [`DocumentStorage`]: `crate::DocumentStorage`
/// [`MemoryStorage`]: `crate::MemoryStorage`
#[derive(Debug)]
pub struct CachedStorage<S, C> {
    primary: S,
    cache: C,
}

impl<S, C> CachedStorage<S, C>
where
    S: Storage,
    C: Storage,
{
    pub fn new(primary: S, cache: C) -> Self {
        Self { primary, cache }
    }

    /// Builds the wrapper and pre-loads the cache by paging the whole
    /// primary through it.
    pub fn populated(primary: S, cache: C) -> Result<Self> {
        const PAGE: usize = 1000;

        let mut offset = 0;
        loop {
            let page = primary.get_all(PAGE, offset)?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            for policy in page {
                cache.add(policy)?;
            }
        }
        info!(policies = offset, "pre-loaded policy cache");
        Ok(Self { primary, cache })
    }
}

impl<S, C> Storage for CachedStorage<S, C>
where
    S: Storage,
    C: Storage,
{
    fn add(&self, policy: Policy) -> Result<()> {
        self.primary.add(policy.clone())?;
        match self.cache.add(policy) {
            // already mirrored by an earlier run
            Err(Error::PolicyExists(_)) => Ok(()),
            other => other,
        }
    }

    fn get(&self, uid: &str) -> Result<Option<Policy>> {
        match self.cache.get(uid)? {
            Some(policy) => Ok(Some(policy)),
            None => self.primary.get(uid),
        }
    }

    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>> {
        let cached = self.cache.get_all(limit, offset)?;
        if cached.is_empty() {
            return self.primary.get_all(limit, offset);
        }
        Ok(cached)
    }

    fn update(&self, policy: Policy) -> Result<()> {
        self.primary.update(policy.clone())?;
        match self.cache.update(policy.clone()) {
            // not mirrored yet; bring the cache up to date
            Err(Error::PolicyNotFound(_)) => self.cache.add(policy),
            other => other,
        }
    }

    fn delete(&self, uid: &str) -> Result<()> {
        self.primary.delete(uid)?;
        match self.cache.delete(uid) {
            Err(Error::PolicyNotFound(_)) => Ok(()),
            other => other,
        }
    }

    fn find_for_inquiry(&self, inquiry: &Inquiry, hint: CheckerKind) -> Result<Vec<Policy>> {
        let cached = self.cache.find_for_inquiry(inquiry, hint)?;
        if cached.is_empty() {
            return self.primary.find_for_inquiry(inquiry, hint);
        }
        Ok(cached)
    }
}
