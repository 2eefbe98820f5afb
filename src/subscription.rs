//! Azure subscriptions as resolved for one (account, tenant) pair.

use std::sync::Arc;

use crate::account::Account;
use crate::auth::{AzureAuthentication, TokenCredential};
use crate::environment::CloudEnvironment;

/// An Azure subscription, stamped with the account and tenant it was
/// resolved through.
///
/// A subscription id alone is not unique in this model: the same
/// subscription can legitimately surface under several (account, tenant)
/// pairs, so identity is the `(account.id, tenant_id, subscription_id)`
/// triple. Display fields carry no identity semantics.
#[derive(Clone)]
pub struct Subscription {
    /// Subscription id, a GUID.
    pub subscription_id: String,
    /// Display name.
    pub name: String,
    /// Tenant the subscription belongs to. When the listing API reports a
    /// tenant id of its own (cross-tenant visibility) that id is used,
    /// otherwise this is the tenant the query ran against.
    pub tenant_id: String,
    /// Account the subscription was resolved through.
    pub account: Account,
    /// Cloud the subscription lives in.
    pub environment: CloudEnvironment,
    /// True when `environment` is a user-supplied cloud.
    pub is_custom_cloud: bool,
    /// Lazy session access bound to this subscription's (account, tenant).
    pub authentication: Arc<dyn AzureAuthentication>,
    /// Lazy SDK-style credential bound to the same pair.
    pub credential: Arc<dyn TokenCredential>,
}

impl Subscription {
    /// Composite identity key: `accountId/tenantId/subscriptionId`.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.account.id, self.tenant_id, self.subscription_id
        )
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.account.id == other.account.id
            && self.tenant_id == other.tenant_id
            && self.subscription_id == other.subscription_id
    }
}

impl Eq for Subscription {}

impl std::hash::Hash for Subscription {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.account.id.hash(state);
        self.tenant_id.hash(state);
        self.subscription_id.hash(state);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("subscription_id", &self.subscription_id)
            .field("name", &self.name)
            .field("tenant_id", &self.tenant_id)
            .field("account", &self.account.id)
            .field("environment", &self.environment.name)
            .finish_non_exhaustive()
    }
}
