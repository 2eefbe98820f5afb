//! # Azimuth - Azure Subscription Discovery
//!
//! Azimuth resolves the set of Azure subscriptions a user can act against
//! when zero or more accounts are signed in, each with zero or more
//! visible tenants. It is a library for host applications (editor
//! extensions, CLIs) that already own an identity layer: the host supplies
//! a session capability and Azimuth handles discovery, caching,
//! deduplication, filtering, and the "refresh suggested" protocol.
//!
//! ## Core Concepts
//!
//! - **Account**: an identity the user signed into (one Entra identity)
//! - **Tenant**: an Entra ID directory, scoped to the account that sees it
//! - **Subscription**: a billing/management boundary, identified here by
//!   the `(account, tenant, subscription)` triple, never by id alone
//! - **Session**: a short-lived token artifact for one scope set
//! - **Refresh suggestion**: a debounced hint that discovery should re-run
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Host application                         │
//! │    (supplies SessionProvider + ArmClientFactory, renders     │
//! │     results, re-runs discovery on refresh suggestions)       │
//! └──────────────────────────────────────────────────────────────┘
//!                 │ capabilities              ▲ subscriptions, events
//!                 ▼                           │
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   SubscriptionDiscovery                      │
//! │   accounts → tenants (pool of 3) → subscriptions (pool of 5) │
//! │   tenant cap · per-branch NotSignedIn isolation · caches     │
//! │   dedup on account/tenant/subscription · allow-list filters  │
//! └──────────────────────────────────────────────────────────────┘
//!                 │                           ▲
//!                 ▼                           │
//! ┌──────────────────────────────────────────────────────────────┐
//! │        SessionProvider · ArmClient · RefreshNotifier         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use azimuth::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> azimuth::Result<()> {
//!     let provider: Arc<dyn SessionProvider> = host_session_provider();
//!     let discovery = SubscriptionDiscovery::new(
//!         provider,
//!         Arc::new(HttpArmClientFactory::new()),
//!         DiscoveryConfig::default(),
//!     );
//!
//!     discovery.sign_in(None, &SignInOptions::default()).await?;
//!     let subscriptions = discovery
//!         .get_available_subscriptions(&ResolveOptions::default())
//!         .await?;
//!     for subscription in &subscriptions {
//!         println!("{} ({})", subscription.name, subscription.subscription_id);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::account::Account;
    pub use crate::arm::{ArmClient, ArmClientFactory, HttpArmClientFactory};
    pub use crate::auth::{AzureAuthentication, ScopeRequest, TokenCredential};
    pub use crate::config::{CloudSelector, DiscoveryConfig};
    pub use crate::discovery::{ResolveOptions, SignInOptions, SubscriptionDiscovery};
    pub use crate::environment::CloudEnvironment;
    pub use crate::error::{Error, Result};
    pub use crate::notifier::RefreshReason;
    pub use crate::session::{Session, SessionProvider, SessionRequest};
    pub use crate::subscription::Subscription;
    pub use crate::tenant::Tenant;
}

pub mod account;
pub mod arm;
pub mod auth;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod limiter;
pub mod notifier;
pub mod session;
pub mod subscription;
pub mod tenant;

pub use account::Account;
pub use config::DiscoveryConfig;
pub use dedup::dedupe;
pub use discovery::{ResolveOptions, SignInOptions, SubscriptionDiscovery};
pub use error::{Error, Result};
pub use notifier::RefreshReason;
pub use subscription::Subscription;
pub use tenant::Tenant;
