//! Persistence of the policy set with inquiry-driven retrieval.

pub mod document;
pub mod memory;
pub mod migration;

use crate::checker::CheckerKind;
use crate::errors::Result;
use crate::{Inquiry, Policy};

/// A persistent bag of policies.
///
/// Individual operations are atomic with respect to observers: after
/// `add(p)` returns, a subsequent `get` in the same process observes `p`.
/// Implementations synchronize internally; all methods take `&self`.
pub trait Storage {
    /// Persists a new policy. Fails with
    /// [`Error::PolicyExists`](`crate::Error::PolicyExists`) when the uid is
    /// already taken.
    fn add(&self, policy: Policy) -> Result<()>;

    fn get(&self, uid: &str) -> Result<Option<Policy>>;

    /// A page of policies in stable uid order. `limit == 0` yields an
    /// empty page.
    fn get_all(&self, limit: usize, offset: usize) -> Result<Vec<Policy>>;

    /// Replaces the whole record by uid. Fails with
    /// [`Error::PolicyNotFound`](`crate::Error::PolicyNotFound`) when
    /// absent.
    fn update(&self, policy: Policy) -> Result<()>;

    /// Fails with [`Error::PolicyNotFound`](`crate::Error::PolicyNotFound`)
    /// when absent.
    fn delete(&self, uid: &str) -> Result<()>;

    /// Candidate policies for an inquiry, pre-filtered along the checker's
    /// query-path hint.
    ///
    /// The contract is no false negatives: every policy the hinted checker
    /// would deem matching must be in the result. Extras are fine; a
    /// storage may simply return everything.
    fn find_for_inquiry(&self, inquiry: &Inquiry, hint: CheckerKind) -> Result<Vec<Policy>>;
}
