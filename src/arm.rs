//! Paginated Azure Resource Manager list clients.
//!
//! Discovery needs exactly two remote operations: listing the tenants an
//! account can see and listing the subscriptions inside one tenant. Both
//! are consumed through the [`ArmClient`] trait so hosts can plug in an
//! SDK-backed client or a fake; [`HttpArmClient`] is the built-in
//! implementation over plain HTTPS. Retry and throttling policies belong
//! to the transport layer, not here.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::environment::CloudEnvironment;
use crate::error::{Error, Result};
use crate::session::Session;

/// ARM API version used by both list endpoints.
pub const ARM_API_VERSION: &str = "2022-12-01";

/// One tenant as reported by `GET /tenants`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantEntry {
    /// Directory id. Entries without one cannot be acted upon and are
    /// discarded by the resolver.
    pub tenant_id: Option<String>,
    /// Directory display name.
    pub display_name: Option<String>,
    /// Primary verified domain, informational only.
    #[serde(default)]
    pub default_domain: Option<String>,
}

/// One subscription as reported by `GET /subscriptions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    /// Subscription id.
    pub subscription_id: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// The subscription's own tenant. May differ from the tenant the query
    /// ran against (cross-tenant visibility); the resolver prefers this
    /// value when present.
    pub tenant_id: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Continuation link for the next page, when there is one.
    pub next_link: Option<String>,
}

/// A list client bound to one session.
#[async_trait]
pub trait ArmClient: Send + Sync {
    /// Lists tenants visible to the session's account, one page at a time.
    async fn list_tenants(&self, continuation: Option<&str>) -> Result<Page<TenantEntry>>;

    /// Lists subscriptions visible to the session, one page at a time.
    async fn list_subscriptions(&self, continuation: Option<&str>)
        -> Result<Page<SubscriptionEntry>>;
}

/// Builds [`ArmClient`]s bound to a session and environment.
pub trait ArmClientFactory: Send + Sync {
    /// Creates a client authenticated as `session` against `environment`.
    fn create(&self, session: &Session, environment: &CloudEnvironment) -> Arc<dyn ArmClient>;
}

/// Drains a paginated listing into one vector.
pub(crate) async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut continuation: Option<String> = None;
    loop {
        let page = fetch(continuation.take()).await?;
        items.extend(page.items);
        match page.next_link {
            Some(next) => continuation = Some(next),
            None => return Ok(items),
        }
    }
}

// ============================================================================
// Built-in HTTPS client
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

/// [`ArmClientFactory`] producing [`HttpArmClient`]s over a shared
/// `reqwest` connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpArmClientFactory {
    http: reqwest::Client,
}

impl HttpArmClientFactory {
    /// Creates a factory with its own connection pool.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArmClientFactory for HttpArmClientFactory {
    fn create(&self, session: &Session, environment: &CloudEnvironment) -> Arc<dyn ArmClient> {
        Arc::new(HttpArmClient {
            http: self.http.clone(),
            access_token: session.access_token.clone(),
            resource_manager_endpoint: environment
                .resource_manager_endpoint
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Plain-HTTPS [`ArmClient`] bound to one bearer token.
#[derive(Debug, Clone)]
pub struct HttpArmClient {
    http: reqwest::Client,
    access_token: String,
    resource_manager_endpoint: String,
}

impl HttpArmClient {
    async fn get_page<T>(&self, path: &str, continuation: Option<&str>) -> Result<Page<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        // A continuation link is absolute and already carries the api
        // version.
        let url = match continuation {
            Some(link) => link.to_string(),
            None => format!(
                "{}/{path}?api-version={ARM_API_VERSION}",
                self.resource_manager_endpoint
            ),
        };

        let context = format!("GET {path}");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::request_with_source(context.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::request(
                context,
                format!("service returned {status}: {body}"),
            ));
        }

        let parsed: ListResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::request_with_source(context, e))?;
        Ok(Page {
            items: parsed.value,
            next_link: parsed.next_link,
        })
    }
}

#[async_trait]
impl ArmClient for HttpArmClient {
    async fn list_tenants(&self, continuation: Option<&str>) -> Result<Page<TenantEntry>> {
        self.get_page("tenants", continuation).await
    }

    async fn list_subscriptions(
        &self,
        continuation: Option<&str>,
    ) -> Result<Page<SubscriptionEntry>> {
        self.get_page("subscriptions", continuation).await
    }
}
