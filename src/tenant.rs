//! Entra ID tenants (directories) as seen from one account.

use serde::{Deserialize, Serialize};

use crate::account::Account;

/// An Entra ID directory, scoped to the account that can see it.
///
/// The same real-world tenant appears once per account that has access to
/// it; the owning `account` is stamped at resolution time and never changes
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Directory (tenant) id, a GUID.
    pub tenant_id: String,
    /// Display name reported by the tenant listing, when present.
    pub display_name: Option<String>,
    /// The account through which this tenant was discovered.
    pub account: Account,
}

impl Tenant {
    /// Creates a tenant stamped with its originating account.
    pub fn new(
        tenant_id: impl Into<String>,
        display_name: Option<String>,
        account: Account,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            display_name,
            account,
        }
    }

    /// Name used for presentation ordering: display name, falling back to
    /// the tenant id when absent.
    pub fn sort_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.tenant_id)
    }
}

impl PartialEq for Tenant {
    fn eq(&self, other: &Self) -> bool {
        self.tenant_id == other.tenant_id && self.account == other.account
    }
}

impl Eq for Tenant {}

impl std::hash::Hash for Tenant {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.tenant_id.hash(state);
        self.account.hash(state);
    }
}

/// Sorts tenants for presentation: case-insensitive by display name,
/// falling back to the tenant id when names tie or are absent. Folding is
/// Unicode lowercase mapping, not locale-aware collation, so the order
/// does not depend on the host locale.
pub(crate) fn sort_tenants(tenants: &mut [Tenant]) {
    tenants.sort_by(|a, b| {
        a.sort_name()
            .to_lowercase()
            .cmp(&b.sort_name().to_lowercase())
            .then_with(|| a.tenant_id.cmp(&b.tenant_id))
    });
}
