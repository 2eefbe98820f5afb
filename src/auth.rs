//! Authentication handles bound to one (account, tenant) pair.
//!
//! Every resolved subscription carries two capability objects: an
//! [`AzureAuthentication`] for session access and a [`TokenCredential`]
//! compatible with SDK-style `get_token` call sites. Both are lazy: nothing
//! is fetched at construction time, so resolving a thousand subscriptions
//! triggers zero token acquisitions until the caller actually uses one.

use std::sync::Arc;

use async_trait::async_trait;

use crate::account::Account;
use crate::environment::CloudEnvironment;
use crate::error::{redact, Error, Result};
use crate::session::{
    scopes_or_default, with_tenant_scope, Session, SessionProvider, SessionRequest,
};

/// A scope set or a CAE claims challenge to satisfy.
#[derive(Debug, Clone)]
pub enum ScopeRequest {
    /// Explicit resource scopes; empty means the cloud default.
    Scopes(Vec<String>),
    /// A claims challenge from a `WWW-Authenticate` response, passed
    /// through to the identity layer verbatim.
    Challenge(String),
}

/// A bearer token produced by a [`TokenCredential`].
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token value.
    pub token: String,
}

/// Session access bound to a specific (account, tenant) pair.
#[async_trait]
pub trait AzureAuthentication: Send + Sync {
    /// Obtains a session for the given scopes (empty = cloud default),
    /// prompting only if a silent attempt finds nothing cached.
    async fn get_session(&self, scopes: &[String]) -> Result<Session>;

    /// Like [`get_session`](Self::get_session), but also accepts a claims
    /// challenge instead of plain scopes.
    async fn get_session_with_scopes(&self, request: ScopeRequest) -> Result<Session>;
}

/// SDK-style credential: produces a bearer token for a scope set.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Obtains a token for the given scopes (empty = cloud default).
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken>;
}

/// Lazy implementation of both handle traits over a [`SessionProvider`].
struct LazyAuthentication {
    provider: Arc<dyn SessionProvider>,
    environment: CloudEnvironment,
    account: Account,
    tenant_id: String,
}

impl LazyAuthentication {
    async fn acquire(
        &self,
        scopes: Vec<String>,
        claims_challenge: Option<String>,
    ) -> Result<Session> {
        let scopes = with_tenant_scope(scopes, Some(&self.tenant_id));

        let mut silent = SessionRequest::silent()
            .for_account(self.account.clone())
            .for_tenant(self.tenant_id.clone());
        silent.claims_challenge = claims_challenge.clone();
        if let Some(session) = self.provider.get_session(&scopes, &silent).await? {
            return Ok(session);
        }

        // Nothing cached; this is the one place a deferred handle is
        // allowed to prompt.
        let mut prompt = SessionRequest::prompt()
            .for_account(self.account.clone())
            .for_tenant(self.tenant_id.clone());
        prompt.claims_challenge = claims_challenge;
        match self.provider.get_session(&scopes, &prompt).await? {
            Some(session) => Ok(session),
            None => Err(Error::not_signed_in(format!(
                "account {} tenant {}",
                redact(&self.account.id),
                redact(&self.tenant_id)
            ))),
        }
    }
}

#[async_trait]
impl AzureAuthentication for LazyAuthentication {
    async fn get_session(&self, scopes: &[String]) -> Result<Session> {
        let scopes = scopes_or_default(scopes, &self.environment);
        self.acquire(scopes, None).await
    }

    async fn get_session_with_scopes(&self, request: ScopeRequest) -> Result<Session> {
        match request {
            ScopeRequest::Scopes(scopes) => {
                let scopes = scopes_or_default(&scopes, &self.environment);
                self.acquire(scopes, None).await
            }
            ScopeRequest::Challenge(challenge) => {
                let scopes = scopes_or_default(&[], &self.environment);
                self.acquire(scopes, Some(challenge)).await
            }
        }
    }
}

#[async_trait]
impl TokenCredential for LazyAuthentication {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        let session = AzureAuthentication::get_session(self, scopes).await?;
        Ok(AccessToken {
            token: session.access_token,
        })
    }
}

/// Handle pair stamped onto one subscription.
pub(crate) struct HandlePair {
    pub authentication: Arc<dyn AzureAuthentication>,
    pub credential: Arc<dyn TokenCredential>,
}

/// Builds the lazy authentication/credential pair for one
/// (account, tenant). One underlying object backs both handles.
pub(crate) fn handles_for(
    provider: Arc<dyn SessionProvider>,
    environment: CloudEnvironment,
    account: Account,
    tenant_id: String,
) -> HandlePair {
    let lazy = Arc::new(LazyAuthentication {
        provider,
        environment,
        account,
        tenant_id,
    });
    HandlePair {
        authentication: lazy.clone(),
        credential: lazy,
    }
}
