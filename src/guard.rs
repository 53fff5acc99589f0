use tracing::{error, info};

use crate::checker::Checker;
use crate::errors::Result;
use crate::storage::Storage;
use crate::{Effect, Inquiry};

/// The top-level decision component: a storage full of policies plus one
/// matching strategy.
///
/// Aggregation is deny-overrides: an inquiry is allowed iff at least one
/// policy matches it and none of the matching policies denies. No match at
/// all is a deny. The guard holds no mutable state and may be shared
/// across threads freely.
#[derive(Debug)]
pub struct Guard<S, C> {
    storage: S,
    checker: C,
}

impl<S, C> Guard<S, C>
where
    S: Storage,
    C: Checker,
{
    pub fn new(storage: S, checker: C) -> Self {
        Self { storage, checker }
    }

    /// Decides an inquiry, failing closed: a storage failure is logged and
    /// answered with a deny.
    pub fn is_allowed(&self, inquiry: &Inquiry) -> bool {
        match self.try_is_allowed(inquiry) {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(error = %err, "denying inquiry after storage failure");
                false
            }
        }
    }

    /// Decides an inquiry, surfacing storage failures to the caller.
    pub fn try_is_allowed(&self, inquiry: &Inquiry) -> Result<bool> {
        let candidates = self.storage.find_for_inquiry(inquiry, self.checker.hint())?;

        let mut matched = 0usize;
        let mut denied = false;
        for policy in &candidates {
            if self.checker.fits(policy, inquiry) {
                matched += 1;
                if policy.effect() == Effect::Deny {
                    denied = true;
                }
            }
        }

        let allowed = matched > 0 && !denied;
        info!(
            subject = %inquiry.subject,
            action = %inquiry.action,
            resource = %inquiry.resource,
            candidates = candidates.len(),
            matched,
            allowed,
            "resolved inquiry"
        );
        Ok(allowed)
    }
}
