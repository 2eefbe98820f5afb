//! Bounded-parallelism task queue.
//!
//! [`ConcurrencyLimiter`] runs at most `limit` queued tasks at once and
//! starts waiting tasks in the order they were submitted. Tenant and
//! subscription listing each cost at least one network round trip, so the
//! orchestrator runs each tier through its own limiter instead of fanning
//! out unbounded against every account and tenant.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

struct LimiterState {
    limit: usize,
    running: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Runs async tasks with a fixed bound on concurrency.
///
/// Tasks submitted through [`queue`](Self::queue) start in FIFO submission
/// order, at most `limit` at a time; when a running task settles (success
/// or failure) the next waiter is started. A task's failure never blocks
/// or cancels its siblings, and the future returned by `queue` settles
/// exactly as the task itself does.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    state: Arc<Mutex<LimiterState>>,
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing `limit` concurrent tasks (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LimiterState {
                limit: limit.max(1),
                running: 0,
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Submits a task; the returned future completes with the task's
    /// output once a slot was available and the task ran.
    ///
    /// The submission is registered synchronously inside this call, so the
    /// relative order of two `queue` calls is the relative order in which
    /// the tasks start. Dropping the returned future before completion
    /// gives the slot (or queue position) back.
    pub fn queue<F, T>(&self, task: F) -> impl Future<Output = T>
    where
        F: Future<Output = T>,
    {
        // Claim a slot or take a queue position before any await, so
        // submission order is the start order.
        let turn = {
            let mut state = self.state.lock();
            if state.running < state.limit {
                state.running += 1;
                Turn::Ready(SlotGuard {
                    state: Arc::clone(&self.state),
                })
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Turn::Waiting(WaitingTurn {
                    rx: Some(rx),
                    state: Arc::clone(&self.state),
                })
            }
        };

        async move {
            // The guard releases the slot when the task settles, and also
            // when the enclosing future is dropped mid-task or before it
            // ever polled.
            let _slot = match turn {
                Turn::Ready(guard) => guard,
                Turn::Waiting(mut waiting) => waiting.acquire().await,
            };
            task.await
        }
    }

    /// Number of tasks currently running (diagnostic).
    pub fn running(&self) -> usize {
        self.state.lock().running
    }
}

enum Turn {
    Ready(SlotGuard),
    Waiting(WaitingTurn),
}

/// A claimed queue position that has not yet received its slot.
struct WaitingTurn {
    rx: Option<oneshot::Receiver<()>>,
    state: Arc<Mutex<LimiterState>>,
}

impl WaitingTurn {
    async fn acquire(&mut self) -> SlotGuard {
        if let Some(rx) = self.rx.as_mut() {
            // The slot is handed over still-claimed; the sender is only
            // dropped without sending when the limiter state itself is
            // torn down, which our Arc prevents.
            let _ = rx.await;
            self.rx = None;
            trace!("limiter slot acquired after waiting");
        }
        SlotGuard {
            state: Arc::clone(&self.state),
        }
    }
}

impl Drop for WaitingTurn {
    fn drop(&mut self) {
        // Dropped while still in line. The handoff may have raced with the
        // drop and already sent the slot; reclaim it so capacity is not
        // lost for the lifetime of the limiter.
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                drop(SlotGuard {
                    state: Arc::clone(&self.state),
                });
            }
        }
    }
}

struct SlotGuard {
    state: Arc<Mutex<LimiterState>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        // Hand the slot to the first waiter still listening. A send can
        // only fail when that waiter's future was dropped; skip it and try
        // the next.
        while let Some(tx) = state.waiters.pop_front() {
            if tx.send(()).is_ok() {
                return;
            }
        }
        state.running -= 1;
    }
}
