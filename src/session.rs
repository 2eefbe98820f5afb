//! Session Oracle boundary.
//!
//! Azimuth never talks to the identity layer directly; it consumes a
//! [`SessionProvider`] capability supplied by the host (in VS Code terms,
//! the `vscode.authentication` API for the Microsoft provider). The core
//! owns scope construction: substituting the cloud's default ARM scope when
//! the caller passes none, and appending the synthetic
//! `VSCODE_TENANT:<tenantId>` token the identity layer uses to select the
//! right authority.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::account::Account;
use crate::environment::CloudEnvironment;
use crate::error::Result;

/// Prefix of the synthetic scope token that selects a tenant authority.
pub const TENANT_SCOPE_PREFIX: &str = "VSCODE_TENANT:";

/// A short-lived credential artifact for a specific scope set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Provider-assigned session id.
    pub id: String,
    /// Bearer token for the requested scopes.
    pub access_token: String,
    /// The account the session belongs to.
    pub account: Account,
    /// Scopes the token was granted for.
    pub scopes: Vec<String>,
}

/// How a session request is allowed to interact with the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRequest {
    /// Allow the provider to create a session, prompting if needed.
    pub create_if_none: bool,
    /// Never prompt; return nothing when no cached session matches.
    /// Overrides `create_if_none` and `clear_session_preference`.
    pub silent: bool,
    /// Ask the provider to forget its remembered session choice, forcing
    /// the account picker on the next interactive request.
    pub clear_session_preference: bool,
    /// Restrict the request to one account.
    pub account: Option<Account>,
    /// Tenant the session should be scoped to; `None` targets the
    /// account's organizations authority.
    pub tenant_id: Option<String>,
    /// CAE claims challenge to satisfy, passed through verbatim.
    pub claims_challenge: Option<String>,
}

impl SessionRequest {
    /// A request that must never prompt.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Default::default()
        }
    }

    /// A request that may prompt if no cached session matches.
    pub fn prompt() -> Self {
        Self {
            create_if_none: true,
            ..Default::default()
        }
    }

    /// A request that forces a fresh account choice.
    pub fn force_new() -> Self {
        Self {
            create_if_none: true,
            clear_session_preference: true,
            ..Default::default()
        }
    }

    /// Restricts the request to one account.
    pub fn for_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    /// Scopes the request to a tenant authority.
    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Whether the provider is allowed to show any UI for this request.
    ///
    /// `silent` always wins: a silent request never prompts, whatever
    /// `clear_session_preference` says.
    pub fn is_interactive(&self) -> bool {
        self.create_if_none && !self.silent
    }
}

/// The identity capability Azimuth consumes.
///
/// Implementations wrap the platform session API. The contract Azimuth
/// relies on:
///
/// - a request with `silent=true` must never prompt and returns `None`
///   when no cached session matches;
/// - `create_if_none=true` may prompt, and Azimuth only sends it after a
///   silent attempt has already failed;
/// - `session_changes()` fires whenever the provider's session set
///   changes (sign-in, sign-out, token refresh across tenants).
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Lists all accounts currently known to the identity provider.
    async fn get_accounts(&self) -> Result<Vec<Account>>;

    /// Obtains a session for the given scopes, or `None` when the request
    /// is silent and nothing cached matches.
    async fn get_session(
        &self,
        scopes: &[String],
        request: &SessionRequest,
    ) -> Result<Option<Session>>;

    /// Stream of session-change notifications.
    fn session_changes(&self) -> broadcast::Receiver<()>;
}

/// Substitutes the cloud's default ARM scope when the caller passed none.
pub fn scopes_or_default(scopes: &[String], environment: &CloudEnvironment) -> Vec<String> {
    if scopes.is_empty() {
        vec![environment.default_scope()]
    } else {
        scopes.to_vec()
    }
}

/// Appends the synthetic tenant-scoping token for the identity layer.
///
/// The token is appended after the resource scopes; an absent tenant means
/// the organizations authority and adds nothing.
pub fn with_tenant_scope(mut scopes: Vec<String>, tenant_id: Option<&str>) -> Vec<String> {
    if let Some(tenant_id) = tenant_id {
        scopes.push(format!("{TENANT_SCOPE_PREFIX}{tenant_id}"));
    }
    scopes
}
