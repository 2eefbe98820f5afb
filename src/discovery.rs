//! Subscription discovery across accounts and tenants.
//!
//! [`SubscriptionDiscovery`] is the orchestrator tying everything
//! together: it resolves accounts through the session provider, fans out
//! to tenant and subscription listing under two bounded pools, isolates
//! per-branch sign-in gaps, enforces the tenant cap, and feeds the merged
//! result through the dedup engine. Each instance owns its caches,
//! limiters, and notifier, so independent instances never share state.
//!
//! ```text
//! get_available_subscriptions
//!     └─ accounts (provider, cached)
//!         └─ tenants per account      [tenant pool, default 3]
//!             └─ subscriptions per    [subscription pool, default 5,
//!                (account, tenant)     capped at maximum_tenants]
//!                 └─ dedupe + allow-list filter
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::arm::{collect_pages, ArmClient, ArmClientFactory};
use crate::auth::handles_for;
use crate::cache::DiscoveryCache;
use crate::config::DiscoveryConfig;
use crate::dedup::dedupe;
use crate::environment::{environment_for, CloudEnvironment};
use crate::error::{redact, Error, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::notifier::{Clock, MonotonicClock, RefreshNotifier, RefreshReason};
use crate::session::{
    scopes_or_default, with_tenant_scope, Session, SessionProvider, SessionRequest,
};
use crate::subscription::Subscription;
use crate::tenant::{sort_tenants, Tenant};

/// Per-call options shared by every resolver operation.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Clear the relevant cache tier before resolving.
    pub no_cache: bool,
    /// Cooperative cancellation for the whole operation.
    pub cancellation: Option<CancellationToken>,
}

impl ResolveOptions {
    /// Options that bypass the cache.
    pub fn uncached() -> Self {
        Self {
            no_cache: true,
            ..Default::default()
        }
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How [`SubscriptionDiscovery::sign_in`] may interact with the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignInOptions {
    /// Only look for a cached session; never prompt.
    pub silent_only: bool,
    /// Clear the provider's remembered session choice so the account
    /// picker is shown again. Ignored when `silent_only` is set.
    pub force_new: bool,
}

/// Multi-account, multi-tenant subscription discovery.
///
/// Construct one per host application (or per test) with
/// [`new`](Self::new). The constructor spawns a listener that forwards the
/// provider's session-change events into the debounced refresh stream, so
/// it must run inside a tokio runtime. Pool sizes and the tenant cap are
/// read from the [`DiscoveryConfig`]; pool sizes are fixed at
/// construction, everything else follows [`set_config`](Self::set_config).
pub struct SubscriptionDiscovery {
    provider: Arc<dyn SessionProvider>,
    clients: Arc<dyn ArmClientFactory>,
    config: RwLock<DiscoveryConfig>,
    cache: DiscoveryCache,
    tenant_limiter: ConcurrencyLimiter,
    subscription_limiter: ConcurrencyLimiter,
    notifier: Arc<RefreshNotifier>,
    session_listener: tokio::task::JoinHandle<()>,
}

impl SubscriptionDiscovery {
    /// Creates an orchestrator over the given capabilities.
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        clients: Arc<dyn ArmClientFactory>,
        config: DiscoveryConfig,
    ) -> Self {
        Self::with_clock(provider, clients, config, Arc::new(MonotonicClock))
    }

    /// Creates an orchestrator whose notifier runs on an injected clock.
    pub fn with_clock(
        provider: Arc<dyn SessionProvider>,
        clients: Arc<dyn ArmClientFactory>,
        config: DiscoveryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let notifier = Arc::new(RefreshNotifier::with_clock(clock));
        let session_listener = spawn_session_listener(provider.as_ref(), Arc::clone(&notifier));
        Self {
            tenant_limiter: ConcurrencyLimiter::new(config.tenant_concurrency),
            subscription_limiter: ConcurrencyLimiter::new(config.subscription_concurrency),
            provider,
            clients,
            config: RwLock::new(config),
            cache: DiscoveryCache::new(),
            notifier,
            session_listener,
        }
    }

    /// Stream of debounced refresh suggestions.
    pub fn on_refresh_suggested(&self) -> broadcast::Receiver<RefreshReason> {
        self.notifier.subscribe()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> DiscoveryConfig {
        self.config.read().clone()
    }

    /// Replaces the configuration wholesale.
    ///
    /// Fires a `SubscriptionFilterChange` refresh suggestion when either
    /// allow-list changed. Pool sizes are not resized.
    pub fn set_config(&self, config: DiscoveryConfig) {
        let filters_changed = {
            let mut current = self.config.write();
            let changed = current.filters_differ(&config);
            *current = config;
            changed
        };
        if filters_changed {
            self.notifier.signal(RefreshReason::SubscriptionFilterChange);
        }
    }

    /// The cache owned by this instance, for explicit invalidation.
    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    fn environment(&self) -> Result<CloudEnvironment> {
        environment_for(&self.config.read())
    }

    /// Obtains a session without prompting, suppressing refresh
    /// notifications around the probe.
    async fn silent_session(
        &self,
        account: &Account,
        tenant_id: Option<&str>,
        environment: &CloudEnvironment,
    ) -> Result<Option<Session>> {
        self.notifier.suppress();
        let scopes = with_tenant_scope(scopes_or_default(&[], environment), tenant_id);
        let mut request = SessionRequest::silent().for_account(account.clone());
        if let Some(tenant_id) = tenant_id {
            request = request.for_tenant(tenant_id);
        }
        self.provider.get_session(&scopes, &request).await
    }

    // ========================================================================
    // Sign-in
    // ========================================================================

    /// Signs in, optionally to a specific tenant.
    ///
    /// Tries a silent acquisition first and only prompts when that finds
    /// nothing (and `silent_only` allows it). Returns whether a session
    /// was obtained. A prompt that produces a session starts a new session
    /// epoch: all cache tiers are invalidated wholesale. A silent attempt
    /// that merely finds an already-established session leaves the caches
    /// intact.
    pub async fn sign_in(&self, tenant_id: Option<&str>, options: &SignInOptions) -> Result<bool> {
        self.notifier.suppress();
        let environment = self.environment()?;
        let scopes = with_tenant_scope(scopes_or_default(&[], &environment), tenant_id);

        let mut request = SessionRequest::silent();
        if let Some(tenant_id) = tenant_id {
            request = request.for_tenant(tenant_id);
        }
        let mut session = self.provider.get_session(&scopes, &request).await?;
        let mut newly_acquired = false;

        if session.is_none() && !options.silent_only {
            self.notifier.suppress();
            let mut request = if options.force_new {
                SessionRequest::force_new()
            } else {
                SessionRequest::prompt()
            };
            if let Some(tenant_id) = tenant_id {
                request = request.for_tenant(tenant_id);
            }
            session = self.provider.get_session(&scopes, &request).await?;
            newly_acquired = session.is_some();
        }

        match session {
            Some(session) => {
                info!(account = %redact(&session.account.id), "signed in");
                if newly_acquired {
                    self.cache.clear();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // Account resolution
    // ========================================================================

    /// Lists signed-in accounts, filtered by the account allow-list.
    ///
    /// The provider is queried once per cache-fill; an empty provider list
    /// fails with `NotSignedIn` (zero accounts means zero possible
    /// subscriptions). The unfiltered list is cached and the allow-list
    /// applies on every read, so a filter change needs no refetch.
    pub async fn get_accounts(&self, options: &ResolveOptions) -> Result<Vec<Account>> {
        options.check()?;
        if options.no_cache {
            self.cache.clear_accounts();
        }

        let accounts = match self.cache.accounts() {
            Some(cached) => cached,
            None => {
                let listed = self.provider.get_accounts().await?;
                if listed.is_empty() {
                    return Err(Error::not_signed_in("any account"));
                }
                debug!(count = listed.len(), "accounts resolved");
                self.cache.store_accounts(listed)
            }
        };

        let config = self.config.read().clone();
        Ok(accounts
            .iter()
            .filter(|account| config.account_selected(&account.id))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Tenant resolution
    // ========================================================================

    /// Lists the tenants one account can see.
    ///
    /// Authenticates against the account's organizations authority (no
    /// specific tenant), pages through the tenant listing, discards
    /// entries without a tenant id, and returns the result sorted by
    /// display name. Cached per account until `no_cache`.
    pub async fn get_tenants_for_account(
        &self,
        account: &Account,
        options: &ResolveOptions,
    ) -> Result<Vec<Tenant>> {
        options.check()?;
        if options.no_cache {
            self.cache.clear_tenants(&account.id);
        }
        if let Some(cached) = self.cache.tenants_for(&account.id) {
            return Ok((*cached).clone());
        }

        let environment = self.environment()?;
        let session = self
            .silent_session(account, None, &environment)
            .await?
            .ok_or_else(|| Error::not_signed_in(format!("account {}", redact(&account.id))))?;
        let client = self.clients.create(&session, &environment);

        let entries = collect_pages(|continuation| {
            let client: Arc<dyn ArmClient> = Arc::clone(&client);
            async move { client.list_tenants(continuation.as_deref()).await }
        })
        .await?;

        let mut tenants: Vec<Tenant> = entries
            .into_iter()
            .filter_map(|entry| match entry.tenant_id {
                Some(tenant_id) => Some(Tenant::new(tenant_id, entry.display_name, account.clone())),
                None => {
                    debug!(
                        account = %redact(&account.id),
                        "discarding tenant entry without a tenant id"
                    );
                    None
                }
            })
            .collect();
        sort_tenants(&mut tenants);
        debug!(account = %redact(&account.id), count = tenants.len(), "tenants resolved");

        self.cache.store_tenants(&account.id, tenants.clone());
        Ok(tenants)
    }

    /// Lists the account's tenants that have no usable cached session.
    ///
    /// These are the tenants a host would surface as "sign in required".
    /// Each tenant is probed silently under the subscription pool; probes
    /// suppress refresh notifications like any other silent session call.
    pub async fn get_unauthenticated_tenants_for_account(
        &self,
        account: &Account,
        options: &ResolveOptions,
    ) -> Result<Vec<Tenant>> {
        let tenants = self.get_tenants_for_account(account, options).await?;
        let environment = self.environment()?;

        let probes: Vec<_> = tenants
            .into_iter()
            .map(|tenant| {
                let environment = environment.clone();
                self.subscription_limiter.queue(async move {
                    options.check()?;
                    let session = self
                        .silent_session(&tenant.account, Some(&tenant.tenant_id), &environment)
                        .await?;
                    Ok::<_, Error>((tenant, session.is_none()))
                })
            })
            .collect();

        let mut unauthenticated = Vec::new();
        for result in futures::future::join_all(probes).await {
            let (tenant, missing) = result?;
            if missing {
                unauthenticated.push(tenant);
            }
        }
        Ok(unauthenticated)
    }

    // ========================================================================
    // Subscription resolution
    // ========================================================================

    /// Lists the subscriptions inside one (account, tenant) pair.
    ///
    /// Silent-only: when no cached session covers the tenant this fails
    /// with `NotSignedIn`, which aggregate callers catch and skip. Each
    /// subscription is stamped with tenant, account, environment, and lazy
    /// authentication/credential handles; nothing fetches a token here.
    /// When the listing reports a subscription's own tenant id (visible
    /// across tenants), that id wins over the query tenant.
    pub async fn get_subscriptions_for_tenant(
        &self,
        tenant: &Tenant,
        options: &ResolveOptions,
    ) -> Result<Vec<Subscription>> {
        options.check()?;
        let account = &tenant.account;
        if options.no_cache {
            self.cache
                .clear_subscriptions(&account.id, &tenant.tenant_id);
        }
        if let Some(cached) = self.cache.subscriptions_for(&account.id, &tenant.tenant_id) {
            return Ok((*cached).clone());
        }

        let environment = self.environment()?;
        let session = self
            .silent_session(account, Some(&tenant.tenant_id), &environment)
            .await?
            .ok_or_else(|| {
                Error::not_signed_in(format!(
                    "account {} tenant {}",
                    redact(&account.id),
                    redact(&tenant.tenant_id)
                ))
            })?;
        let client = self.clients.create(&session, &environment);

        let entries = collect_pages(|continuation| {
            let client: Arc<dyn ArmClient> = Arc::clone(&client);
            async move { client.list_subscriptions(continuation.as_deref()).await }
        })
        .await?;

        let subscriptions: Vec<Subscription> = entries
            .into_iter()
            .filter_map(|entry| {
                let subscription_id = match entry.subscription_id {
                    Some(id) => id,
                    None => {
                        debug!(
                            tenant = %redact(&tenant.tenant_id),
                            "discarding subscription entry without an id"
                        );
                        return None;
                    }
                };
                let tenant_id = entry
                    .tenant_id
                    .unwrap_or_else(|| tenant.tenant_id.clone());
                let handles = handles_for(
                    Arc::clone(&self.provider),
                    environment.clone(),
                    account.clone(),
                    tenant_id.clone(),
                );
                Some(Subscription {
                    name: entry.display_name.unwrap_or_else(|| subscription_id.clone()),
                    subscription_id,
                    tenant_id,
                    account: account.clone(),
                    environment: environment.clone(),
                    is_custom_cloud: environment.is_custom,
                    authentication: handles.authentication,
                    credential: handles.credential,
                })
            })
            .collect();
        debug!(
            account = %redact(&account.id),
            tenant = %redact(&tenant.tenant_id),
            count = subscriptions.len(),
            "subscriptions resolved"
        );

        self.cache
            .store_subscriptions(&account.id, &tenant.tenant_id, subscriptions.clone());
        Ok(subscriptions)
    }

    // ========================================================================
    // Aggregate discovery
    // ========================================================================

    /// Resolves every subscription the user can act against.
    ///
    /// Fans out accounts → tenants → subscriptions under the two bounded
    /// pools, skipping branches that fail with `NotSignedIn`, capping
    /// total tenants processed at `maximum_tenants` (a soft cap, not an
    /// error), and deduplicating on `(account, tenant, subscription)`.
    /// Zero signed-in accounts is the one sign-in gap that propagates.
    /// Cancellation is checked before each account's tenant fetch, before
    /// each tenant's subscription fetch, and at the end; once the token
    /// fires, `Cancelled` supersedes any other error while in-flight calls
    /// finish and are discarded.
    pub async fn get_available_subscriptions(
        &self,
        options: &ResolveOptions,
    ) -> Result<Vec<Subscription>> {
        options.check()?;
        let accounts = self.get_accounts(options).await?;
        let config = self.config.read().clone();
        let admitted = AtomicUsize::new(0);

        let account_tasks: Vec<_> = accounts
            .iter()
            .map(|account| {
                self.resolve_account_subscriptions(account, options, &config, &admitted)
            })
            .collect();
        let results = futures::future::join_all(account_tasks).await;

        let mut merged = Vec::new();
        let mut first_error: Option<Error> = None;
        for result in results {
            match result {
                Ok(mut subscriptions) => merged.append(&mut subscriptions),
                Err(error) if error.is_cancelled() => return Err(Error::Cancelled),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        options.check()?;
        if let Some(error) = first_error {
            return Err(error);
        }

        let deduped = dedupe(merged);
        self.apply_subscription_filter(deduped, &config)
    }

    /// Resolves one account's subscriptions across its admitted tenants.
    async fn resolve_account_subscriptions(
        &self,
        account: &Account,
        options: &ResolveOptions,
        config: &DiscoveryConfig,
        admitted: &AtomicUsize,
    ) -> Result<Vec<Subscription>> {
        options.check()?;
        let tenants = match self
            .tenant_limiter
            .queue(self.get_tenants_for_account(account, options))
            .await
        {
            Ok(tenants) => tenants,
            Err(error) if error.is_not_signed_in() => {
                warn!(
                    account = %redact(&account.id),
                    "skipping account without a usable session"
                );
                return Ok(Vec::new());
            }
            Err(error) => {
                if !error.is_cancelled() {
                    warn!(
                        account = %redact(&account.id),
                        %error,
                        "tenant listing failed"
                    );
                }
                return Err(error);
            }
        };

        let tenant_tasks: Vec<_> = tenants
            .iter()
            .map(|tenant| {
                self.subscription_limiter.queue(async move {
                    // Check-and-increment happens before any suspension
                    // point, so the cap cannot be overshot by interleaved
                    // branches.
                    if !admit_tenant(admitted, config.maximum_tenants) {
                        debug!(
                            tenant = %redact(&tenant.tenant_id),
                            cap = config.maximum_tenants,
                            "tenant cap reached; skipping remaining tenants"
                        );
                        return Ok(Vec::new());
                    }
                    options.check()?;
                    match self.get_subscriptions_for_tenant(tenant, options).await {
                        Ok(subscriptions) => Ok(subscriptions),
                        Err(error) if error.is_not_signed_in() => {
                            warn!(
                                account = %redact(&account.id),
                                tenant = %redact(&tenant.tenant_id),
                                "skipping tenant without a usable session"
                            );
                            Ok(Vec::new())
                        }
                        Err(error) => {
                            if !error.is_cancelled() {
                                warn!(
                                    account = %redact(&account.id),
                                    tenant = %redact(&tenant.tenant_id),
                                    %error,
                                    "subscription listing failed"
                                );
                            }
                            Err(error)
                        }
                    }
                })
            })
            .collect();

        let mut merged = Vec::new();
        let mut first_error: Option<Error> = None;
        for result in futures::future::join_all(tenant_tasks).await {
            match result {
                Ok(mut subscriptions) => merged.append(&mut subscriptions),
                Err(error) if error.is_cancelled() => return Err(Error::Cancelled),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(merged),
        }
    }

    /// Applies the subscription allow-list; empty list means no filter.
    fn apply_subscription_filter(
        &self,
        subscriptions: Vec<Subscription>,
        config: &DiscoveryConfig,
    ) -> Result<Vec<Subscription>> {
        let selected = config.selected_subscription_keys()?;
        if selected.is_empty() {
            return Ok(subscriptions);
        }
        Ok(subscriptions
            .into_iter()
            .filter(|subscription| {
                selected.iter().any(|key| {
                    key.account_id == subscription.account.id
                        && key.subscription_id == subscription.subscription_id
                })
            })
            .collect())
    }
}

impl Drop for SubscriptionDiscovery {
    fn drop(&mut self) {
        self.session_listener.abort();
    }
}

impl std::fmt::Debug for SubscriptionDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionDiscovery")
            .field("config", &*self.config.read())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Claims one slot under the tenant cap; effectively atomic because it
/// runs before any suspension point in the admitting branch.
fn admit_tenant(admitted: &AtomicUsize, cap: usize) -> bool {
    admitted
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
            (count < cap).then_some(count + 1)
        })
        .is_ok()
}

/// Forwards provider session-change events into the debounced stream.
fn spawn_session_listener(
    provider: &dyn SessionProvider,
    notifier: Arc<RefreshNotifier>,
) -> tokio::task::JoinHandle<()> {
    let mut changes = provider.session_changes();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(()) => {
                    notifier.signal(RefreshReason::SessionChange);
                }
                // A lagged receiver only means we missed intermediate
                // events; one refresh suggestion still covers them.
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    notifier.signal(RefreshReason::SessionChange);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
