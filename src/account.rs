//! Signed-in account identity.

use serde::{Deserialize, Serialize};

/// An identity the user has signed into (one Microsoft Entra identity).
///
/// Accounts are created by the identity provider and are immutable for the
/// lifetime of the session. The `id` is the stable key; `label` is the
/// human-readable form (typically the UPN) and carries no identity
/// semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable account identifier assigned by the identity provider.
    pub id: String,
    /// Human-readable label, e.g. `user@contoso.com`.
    pub label: String,
}

impl Account {
    /// Creates an account handle.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Account {}

impl std::hash::Hash for Account {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}
