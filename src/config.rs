//! Configuration surface for subscription discovery.
//!
//! The configuration is owned by the host application and read by Azimuth;
//! it selects the target cloud, optionally narrows results with account and
//! subscription allow-lists, and bounds aggregate discovery (tenant cap,
//! pool sizes). All fields have defaults so an empty config is valid.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default soft cap on tenants processed per aggregate discovery pass.
pub const DEFAULT_MAXIMUM_TENANTS: usize = 10;
/// Default bound on concurrent tenant-listing calls.
pub const DEFAULT_TENANT_CONCURRENCY: usize = 3;
/// Default bound on concurrent subscription-listing calls.
pub const DEFAULT_SUBSCRIPTION_CONCURRENCY: usize = 5;

/// Which Azure cloud to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloudSelector {
    /// Azure public cloud (default).
    Public,
    /// Azure operated by 21Vianet.
    China,
    /// Azure US Government.
    UsGovernment,
    /// User-supplied endpoints, see [`CustomCloudConfig`].
    Custom,
}

impl Default for CloudSelector {
    fn default() -> Self {
        CloudSelector::Public
    }
}

/// Endpoints for a user-supplied cloud (e.g. Azure Stack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomCloudConfig {
    /// Environment name shown to the user.
    pub name: String,
    /// Resource Manager endpoint.
    pub resource_manager_endpoint: String,
    /// Portal base URL.
    pub portal_endpoint: String,
    /// Entra ID authority base URL.
    pub active_directory_endpoint: String,
}

impl Default for CustomCloudConfig {
    fn default() -> Self {
        Self {
            name: "AzureCustomCloud".into(),
            resource_manager_endpoint: String::new(),
            portal_endpoint: String::new(),
            active_directory_endpoint: String::new(),
        }
    }
}

/// Main configuration structure for subscription discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Target cloud.
    pub cloud: CloudSelector,

    /// Endpoints when `cloud` is `custom`.
    pub custom_cloud: Option<CustomCloudConfig>,

    /// Account-id allow-list. Empty means "no filter".
    pub selected_accounts: Vec<String>,

    /// Subscription allow-list as `accountId/subscriptionId` composite
    /// strings. Empty means "no filter".
    pub selected_subscriptions: Vec<String>,

    /// Soft cap on tenants processed per aggregate discovery pass.
    pub maximum_tenants: usize,

    /// Bound on concurrent tenant-listing calls.
    pub tenant_concurrency: usize,

    /// Bound on concurrent subscription-listing calls.
    pub subscription_concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cloud: CloudSelector::default(),
            custom_cloud: None,
            selected_accounts: Vec::new(),
            selected_subscriptions: Vec::new(),
            maximum_tenants: DEFAULT_MAXIMUM_TENANTS,
            tenant_concurrency: DEFAULT_TENANT_CONCURRENCY,
            subscription_concurrency: DEFAULT_SUBSCRIPTION_CONCURRENCY,
        }
    }
}

/// One parsed entry of the subscription allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectedSubscription {
    /// Account id half of the composite entry.
    pub account_id: String,
    /// Subscription id half of the composite entry.
    pub subscription_id: String,
}

impl SelectedSubscription {
    /// Parses an `accountId/subscriptionId` composite string.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once('/') {
            Some((account_id, subscription_id))
                if !account_id.is_empty() && !subscription_id.is_empty() =>
            {
                Ok(Self {
                    account_id: account_id.to_string(),
                    subscription_id: subscription_id.to_string(),
                })
            }
            _ => Err(Error::InvalidConfiguration(format!(
                "selected subscription '{raw}' is not of the form accountId/subscriptionId"
            ))),
        }
    }
}

impl DiscoveryConfig {
    /// Returns true when the account allow-list admits the given account id.
    pub fn account_selected(&self, account_id: &str) -> bool {
        self.selected_accounts.is_empty() || self.selected_accounts.iter().any(|a| a == account_id)
    }

    /// Parses the subscription allow-list, rejecting malformed entries.
    pub fn selected_subscription_keys(&self) -> Result<Vec<SelectedSubscription>> {
        self.selected_subscriptions
            .iter()
            .map(|raw| SelectedSubscription::parse(raw))
            .collect()
    }

    /// True when either allow-list differs from `other`'s.
    pub(crate) fn filters_differ(&self, other: &DiscoveryConfig) -> bool {
        self.selected_accounts != other.selected_accounts
            || self.selected_subscriptions != other.selected_subscriptions
    }
}
