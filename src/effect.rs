use serde::{Deserialize, Serialize};

/// Effect string persisted for allowing policies.
pub const ALLOW_ACCESS: &str = "allow";

/// Effect string persisted for denying policies.
pub const DENY_ACCESS: &str = "deny";

/// The decision a [`Policy`](`crate::Policy`) produces when it matches an
/// [`Inquiry`](`crate::Inquiry`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    /// The canonical string form, as persisted by storages.
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => ALLOW_ACCESS,
            Effect::Deny => DENY_ACCESS,
        }
    }
}
