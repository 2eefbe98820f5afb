//! Deduplication and sort engine for resolved subscriptions.

use indexmap::IndexMap;

use crate::subscription::Subscription;

/// Collapses duplicates on `(account, tenant, subscription)` and sorts by
/// display name.
///
/// Later entries in input order overwrite earlier ones with the same
/// composite key. The sort is case-insensitive on the display name; equal
/// names fall back to the raw name and then the composite key, so the
/// output order is total and the function is idempotent. Case folding is
/// Unicode lowercase mapping, not locale-aware collation, so ordering is
/// stable across machines regardless of the host locale.
///
/// The same subscription id under two different tenants (cross-tenant
/// visibility) is two distinct keys and both entries survive.
pub fn dedupe(subscriptions: Vec<Subscription>) -> Vec<Subscription> {
    let mut by_key: IndexMap<String, Subscription> =
        IndexMap::with_capacity(subscriptions.len());
    for subscription in subscriptions {
        by_key.insert(subscription.dedup_key(), subscription);
    }

    let mut result: Vec<Subscription> = by_key.into_values().collect();
    result.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.dedup_key().cmp(&b.dedup_key()))
    });
    result
}
