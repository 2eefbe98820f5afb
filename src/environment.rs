//! Azure cloud environments.
//!
//! Endpoint sets for the public cloud, the sovereign clouds (China,
//! US Government), and user-supplied custom clouds. Environments are cheap
//! value objects derived from configuration on demand; nothing here caches
//! beyond the static tables for the well-known clouds.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{CloudSelector, CustomCloudConfig, DiscoveryConfig};
use crate::error::{Error, Result};

/// Endpoint set for one Azure cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudEnvironment {
    /// Environment name, e.g. `AzureCloud`.
    pub name: String,
    /// Azure Resource Manager endpoint, no trailing slash.
    pub resource_manager_endpoint: String,
    /// Portal base URL.
    pub portal_endpoint: String,
    /// Entra ID (login) authority base URL.
    pub active_directory_endpoint: String,
    /// True when the endpoints came from user configuration rather than a
    /// well-known cloud.
    pub is_custom: bool,
}

impl CloudEnvironment {
    /// The default OAuth2 scope for this cloud's Resource Manager.
    pub fn default_scope(&self) -> String {
        format!(
            "{}/.default",
            self.resource_manager_endpoint.trim_end_matches('/')
        )
    }
}

/// Azure public cloud.
pub static AZURE_PUBLIC: Lazy<CloudEnvironment> = Lazy::new(|| CloudEnvironment {
    name: "AzureCloud".into(),
    resource_manager_endpoint: "https://management.azure.com".into(),
    portal_endpoint: "https://portal.azure.com".into(),
    active_directory_endpoint: "https://login.microsoftonline.com".into(),
    is_custom: false,
});

/// Azure operated by 21Vianet (China).
pub static AZURE_CHINA: Lazy<CloudEnvironment> = Lazy::new(|| CloudEnvironment {
    name: "AzureChinaCloud".into(),
    resource_manager_endpoint: "https://management.chinacloudapi.cn".into(),
    portal_endpoint: "https://portal.azure.cn".into(),
    active_directory_endpoint: "https://login.chinacloudapi.cn".into(),
    is_custom: false,
});

/// Azure US Government cloud.
pub static AZURE_US_GOVERNMENT: Lazy<CloudEnvironment> = Lazy::new(|| CloudEnvironment {
    name: "AzureUSGovernment".into(),
    resource_manager_endpoint: "https://management.usgovcloudapi.net".into(),
    portal_endpoint: "https://portal.azure.us".into(),
    active_directory_endpoint: "https://login.microsoftonline.us".into(),
    is_custom: false,
});

/// Resolves the environment selected by the configuration.
///
/// Custom clouds must supply all three endpoints as parseable URLs; the
/// well-known clouds come from the static tables above.
pub fn environment_for(config: &DiscoveryConfig) -> Result<CloudEnvironment> {
    match config.cloud {
        CloudSelector::Public => Ok(AZURE_PUBLIC.clone()),
        CloudSelector::China => Ok(AZURE_CHINA.clone()),
        CloudSelector::UsGovernment => Ok(AZURE_US_GOVERNMENT.clone()),
        CloudSelector::Custom => match &config.custom_cloud {
            Some(custom) => custom_environment(custom),
            None => Err(Error::InvalidConfiguration(
                "cloud is set to 'custom' but no custom-cloud endpoints are configured".into(),
            )),
        },
    }
}

fn custom_environment(custom: &CustomCloudConfig) -> Result<CloudEnvironment> {
    let validate = |field: &str, value: &str| -> Result<String> {
        Url::parse(value).map_err(|e| {
            Error::InvalidConfiguration(format!("custom cloud {field} '{value}': {e}"))
        })?;
        Ok(value.trim_end_matches('/').to_string())
    };
    Ok(CloudEnvironment {
        name: custom.name.clone(),
        resource_manager_endpoint: validate(
            "resource-manager endpoint",
            &custom.resource_manager_endpoint,
        )?,
        portal_endpoint: validate("portal endpoint", &custom.portal_endpoint)?,
        active_directory_endpoint: validate(
            "active-directory endpoint",
            &custom.active_directory_endpoint,
        )?,
        is_custom: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scope_has_single_slash() {
        assert_eq!(
            AZURE_PUBLIC.default_scope(),
            "https://management.azure.com/.default"
        );
        let mut env = AZURE_PUBLIC.clone();
        env.resource_manager_endpoint = "https://management.azure.com/".into();
        assert_eq!(env.default_scope(), "https://management.azure.com/.default");
    }

    #[test]
    fn test_sovereign_clouds_are_distinct() {
        assert_ne!(
            AZURE_CHINA.resource_manager_endpoint,
            AZURE_US_GOVERNMENT.resource_manager_endpoint
        );
        assert!(!AZURE_CHINA.is_custom);
    }

    #[test]
    fn test_custom_cloud_requires_valid_urls() {
        let custom = CustomCloudConfig {
            name: "AzureStack".into(),
            resource_manager_endpoint: "not a url".into(),
            portal_endpoint: "https://portal.local".into(),
            active_directory_endpoint: "https://login.local".into(),
        };
        let err = custom_environment(&custom).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_custom_cloud_trims_trailing_slash() {
        let custom = CustomCloudConfig {
            name: "AzureStack".into(),
            resource_manager_endpoint: "https://management.local/".into(),
            portal_endpoint: "https://portal.local".into(),
            active_directory_endpoint: "https://login.local".into(),
        };
        let env = custom_environment(&custom).unwrap();
        assert_eq!(env.resource_manager_endpoint, "https://management.local");
        assert!(env.is_custom);
    }
}
