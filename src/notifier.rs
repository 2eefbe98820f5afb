//! Debounced "refresh suggested" notifications.
//!
//! Session-change events arrive in bursts: a bulk sign-in fires one event
//! per tenant, and every silent session probe made during discovery can
//! trigger more. Consumers only need to know that re-running discovery is
//! advisable, so the notifier collapses bursts two ways:
//!
//! - **Debounce**: after a signal is delivered, further signals are
//!   dropped for 5 seconds.
//! - **Suppression**: during a sign-in or any operation that silently
//!   probes session state, signals are dropped entirely; every further
//!   probe re-arms the 5 second suppression window, so a burst of probes
//!   keeps suppression alive continuously.
//!
//! The state machine runs on an injected [`Clock`] so tests drive it with
//! a manual clock instead of real timers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Debounce and suppression window.
pub const REFRESH_WINDOW: Duration = Duration::from_secs(5);

/// Why a refresh is being suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The identity provider's session set changed.
    SessionChange,
    /// The subscription/account allow-lists changed.
    SubscriptionFilterChange,
}

/// Monotonic time source for the notifier state machine.
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// The production clock.
#[derive(Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct NotifierState {
    /// Signals are dropped entirely until this instant.
    suppressed_until: Option<Instant>,
    /// Last delivered signal, for the debounce window.
    last_emit: Option<Instant>,
}

/// Debounced, suppressible event source for refresh suggestions.
pub struct RefreshNotifier {
    clock: Arc<dyn Clock>,
    state: Mutex<NotifierState>,
    sender: broadcast::Sender<RefreshReason>,
}

impl RefreshNotifier {
    /// Creates a notifier over the production clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    /// Creates a notifier over an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            clock,
            state: Mutex::new(NotifierState {
                suppressed_until: None,
                last_emit: None,
            }),
            sender,
        }
    }

    /// Subscribes to delivered refresh suggestions.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshReason> {
        self.sender.subscribe()
    }

    /// Drops all signals for the next 5 seconds, re-arming the window if
    /// suppression is already active.
    pub fn suppress(&self) {
        let until = self.clock.now() + REFRESH_WINDOW;
        self.state.lock().suppressed_until = Some(until);
        trace!("refresh notifications suppressed");
    }

    /// Offers a signal to the state machine; returns true when it was
    /// delivered to subscribers.
    pub fn signal(&self, reason: RefreshReason) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if let Some(until) = state.suppressed_until {
            if now < until {
                trace!(?reason, "signal dropped: suppressed");
                return false;
            }
            state.suppressed_until = None;
        }

        if let Some(last) = state.last_emit {
            if now.duration_since(last) < REFRESH_WINDOW {
                trace!(?reason, "signal dropped: debounced");
                return false;
            }
        }

        state.last_emit = Some(now);
        drop(state);

        debug!(?reason, "refresh suggested");
        // Send only fails when no subscriber exists, which is fine.
        let _ = self.sender.send(reason);
        true
    }
}

impl Default for RefreshNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RefreshNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshNotifier")
            .field("suppressed_until", &state.suppressed_until)
            .field("last_emit", &state.last_emit)
            .finish()
    }
}
