//! Cache tiers for discovery results.
//!
//! Three tiers mirror the resolution hierarchy: the account list, the
//! tenant list per account, and the subscription list per (account,
//! tenant) pair. Entries are only ever replaced wholesale; a no-cache
//! request or a new sign-in clears a tier (or everything), never patches
//! it. The check-then-fill around an empty slot is deliberately unlocked:
//! concurrent fillers redo the same idempotent network call and the last
//! writer wins, which is an accepted inefficiency rather than a
//! correctness problem.
//!
//! The cache is owned by each orchestrator instance, so independent
//! orchestrators (and tests) never share state.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::account::Account;
use crate::subscription::Subscription;
use crate::tenant::Tenant;

/// Cache for one discovery orchestrator instance.
#[derive(Default)]
pub struct DiscoveryCache {
    /// Accounts as reported by the provider, unfiltered.
    accounts: RwLock<Option<Arc<Vec<Account>>>>,
    /// Tenants keyed by lowercased account id.
    tenants: DashMap<String, Arc<Vec<Tenant>>>,
    /// Subscriptions keyed by lowercased `accountId/tenantId`.
    subscriptions: DashMap<String, Arc<Vec<Subscription>>>,
}

/// Cache key for the subscription tier.
pub(crate) fn pair_key(account_id: &str, tenant_id: &str) -> String {
    format!("{account_id}/{tenant_id}").to_lowercase()
}

impl DiscoveryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn accounts(&self) -> Option<Arc<Vec<Account>>> {
        self.accounts.read().clone()
    }

    pub(crate) fn store_accounts(&self, accounts: Vec<Account>) -> Arc<Vec<Account>> {
        let accounts = Arc::new(accounts);
        *self.accounts.write() = Some(accounts.clone());
        accounts
    }

    pub(crate) fn tenants_for(&self, account_id: &str) -> Option<Arc<Vec<Tenant>>> {
        self.tenants
            .get(&account_id.to_lowercase())
            .map(|entry| entry.clone())
    }

    pub(crate) fn store_tenants(&self, account_id: &str, tenants: Vec<Tenant>) -> Arc<Vec<Tenant>> {
        let tenants = Arc::new(tenants);
        self.tenants
            .insert(account_id.to_lowercase(), tenants.clone());
        tenants
    }

    pub(crate) fn subscriptions_for(
        &self,
        account_id: &str,
        tenant_id: &str,
    ) -> Option<Arc<Vec<Subscription>>> {
        self.subscriptions
            .get(&pair_key(account_id, tenant_id))
            .map(|entry| entry.clone())
    }

    pub(crate) fn store_subscriptions(
        &self,
        account_id: &str,
        tenant_id: &str,
        subscriptions: Vec<Subscription>,
    ) -> Arc<Vec<Subscription>> {
        let subscriptions = Arc::new(subscriptions);
        self.subscriptions
            .insert(pair_key(account_id, tenant_id), subscriptions.clone());
        subscriptions
    }

    /// Clears the account tier.
    pub fn clear_accounts(&self) {
        *self.accounts.write() = None;
    }

    /// Clears the tenant tier for one account.
    pub fn clear_tenants(&self, account_id: &str) {
        self.tenants.remove(&account_id.to_lowercase());
    }

    /// Clears the subscription tier for one (account, tenant) pair.
    pub fn clear_subscriptions(&self, account_id: &str, tenant_id: &str) {
        self.subscriptions.remove(&pair_key(account_id, tenant_id));
    }

    /// Clears every tier wholesale. Used on sign-in, when the session
    /// epoch changes.
    pub fn clear(&self) {
        *self.accounts.write() = None;
        self.tenants.clear();
        self.subscriptions.clear();
    }
}

impl std::fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("accounts_cached", &self.accounts.read().is_some())
            .field("tenant_entries", &self.tenants.len())
            .field("subscription_entries", &self.subscriptions.len())
            .finish()
    }
}
