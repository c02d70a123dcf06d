//! Token bucket admission control for upstream requests
//!
//! Tokens refill continuously and lazily on every access; no background task
//! drives refill. Callers that cannot be admitted immediately join a FIFO
//! queue. Each queued waiter owns two timers: a hard timeout and a dispatch
//! timer set to the moment enough tokens should exist for it. Both are
//! aborted on every resolution path. Dropping a pending `acquire` removes
//! its waiter straight away.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::AdmissionError;

const WINDOW: Duration = Duration::from_secs(3600);
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Snapshot of limiter state for logs and status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    /// Whole tokens available now
    pub current_tokens: u32,
    /// Bucket capacity
    pub max_tokens: u32,
    /// Configured hourly quota
    pub refill_rate_per_hour: u32,
    /// Requests admitted in the current rolling hour
    pub requests_this_hour: u64,
    /// Callers queued for a token
    pub waiting_requests: usize,
}

/// A queued caller
struct Waiter {
    id: u64,
    tx: Option<oneshot::Sender<Result<(), AdmissionError>>>,
    timeout: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

impl Waiter {
    /// Abort both timers
    fn cancel(&mut self) {
        self.timeout.abort();
        self.dispatch.abort();
    }

    /// Cancel timers and deliver `result`; false if the caller is gone
    fn resolve(&mut self, result: Result<(), AdmissionError>) -> bool {
        self.cancel();
        match self.tx.take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    window_count: u64,
    window_start: Instant,
    waiters: VecDeque<Waiter>,
}

struct Shared {
    capacity: f64,
    refill_per_ms: f64,
    requests_per_hour: u32,
    next_id: AtomicU64,
    state: Mutex<BucketState>,
}

fn wait_for(tokens_needed: f64, refill_per_ms: f64) -> Duration {
    if tokens_needed <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis((tokens_needed / refill_per_ms).ceil() as u64)
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(state.last_refill).as_secs_f64() * 1000.0;
        state.tokens = (state.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
        state.last_refill = now;

        if now >= state.window_start + WINDOW {
            state.window_count = 0;
            state.window_start = now;
        }
    }

    fn take(&self, state: &mut BucketState) {
        state.tokens -= 1.0;
        state.window_count += 1;
    }

    /// Grant tokens to waiters in order, then re-arm the head's dispatch timer
    fn drain(self: &Arc<Self>, state: &mut BucketState) {
        self.refill(state, Instant::now());

        while state.tokens >= 1.0 {
            let Some(mut waiter) = state.waiters.pop_front() else {
                break;
            };
            self.take(state);
            if !waiter.resolve(Ok(())) {
                // Caller stopped waiting; refund
                state.tokens += 1.0;
                state.window_count -= 1;
            }
        }

        let wait = wait_for(1.0 - state.tokens, self.refill_per_ms);
        if let Some(head) = state.waiters.front_mut() {
            head.dispatch.abort();
            head.dispatch = spawn_dispatch(Arc::downgrade(self), wait);
        }
    }

    fn expire(self: &Arc<Self>, id: u64, timeout: Duration) {
        let mut state = self.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == id) {
            if let Some(mut waiter) = state.waiters.remove(pos) {
                debug!(timeout_ms = timeout.as_millis() as u64, "Token wait timed out");
                waiter.resolve(Err(AdmissionError::Timeout(timeout)));
            }
        }
        self.drain(&mut state);
    }
}

/// Queue entry held by a pending `acquire`; leaves the queue if the caller
/// stops waiting before it is resolved
struct QueueSlot<'a> {
    shared: &'a Arc<Shared>,
    id: u64,
    settled: bool,
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.shared.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(pos);
            debug!("Queued caller cancelled");
            self.shared.drain(&mut state);
        }
    }
}

fn spawn_dispatch(shared: Weak<Shared>, wait: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        if let Some(shared) = shared.upgrade() {
            let mut state = shared.lock();
            shared.drain(&mut state);
        }
    })
}

/// Token bucket shared by every request to one upstream host
///
/// Cloning is cheap and yields a handle to the same bucket.
#[derive(Clone)]
pub struct TokenBucket {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("stats", &self.stats())
            .finish()
    }
}

impl TokenBucket {
    /// Create a full bucket holding `capacity` tokens that refills at
    /// `requests_per_hour`
    pub fn new(capacity: u32, requests_per_hour: u32) -> Self {
        let now = Instant::now();
        let capacity = f64::from(capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                capacity,
                refill_per_ms: f64::from(requests_per_hour.max(1)) / MS_PER_HOUR,
                requests_per_hour,
                next_id: AtomicU64::new(0),
                state: Mutex::new(BucketState {
                    tokens: capacity,
                    last_refill: now,
                    window_count: 0,
                    window_start: now,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Create a bucket from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.burst_capacity, config.requests_per_hour)
    }

    /// Take a token if one is available and nobody is queued
    pub fn try_acquire(&self) -> bool {
        let mut state = self.shared.lock();
        self.shared.refill(&mut state, Instant::now());

        if !state.waiters.is_empty() || state.tokens < 1.0 {
            return false;
        }
        self.shared.take(&mut state);
        true
    }

    /// Wait up to `timeout` for a token
    ///
    /// Fails fast with [`AdmissionError::WouldExceedTimeout`] when the
    /// computed wait, counting callers already queued, exceeds `timeout`.
    pub async fn acquire(&self, timeout: Duration) -> Result<(), AdmissionError> {
        let (id, rx) = {
            let mut state = self.shared.lock();
            self.shared.refill(&mut state, Instant::now());

            if state.waiters.is_empty() && state.tokens >= 1.0 {
                self.shared.take(&mut state);
                return Ok(());
            }

            let position = state.waiters.len() + 1;
            let required = wait_for(position as f64 - state.tokens, self.shared.refill_per_ms);
            if required > timeout {
                return Err(AdmissionError::WouldExceedTimeout { required, timeout });
            }

            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();

            let weak = Arc::downgrade(&self.shared);
            let timeout_task = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(shared) = weak.upgrade() {
                    shared.expire(id, timeout);
                }
            });
            let dispatch_task = spawn_dispatch(Arc::downgrade(&self.shared), required);

            debug!(
                position,
                wait_ms = required.as_millis() as u64,
                "Queued for request token"
            );
            state.waiters.push_back(Waiter {
                id,
                tx: Some(tx),
                timeout: timeout_task,
                dispatch: dispatch_task,
            });
            (id, rx)
        };

        let mut slot = QueueSlot {
            shared: &self.shared,
            id,
            settled: false,
        };
        // A dropped sender means the bucket itself went away
        let result = rx.await.unwrap_or(Err(AdmissionError::Reset));
        slot.settled = true;
        result
    }

    /// Current limiter statistics; tokens are floored
    pub fn stats(&self) -> AdmissionStats {
        let mut state = self.shared.lock();
        self.shared.refill(&mut state, Instant::now());
        AdmissionStats {
            current_tokens: state.tokens.floor() as u32,
            max_tokens: self.shared.capacity as u32,
            refill_rate_per_hour: self.shared.requests_per_hour,
            requests_this_hour: state.window_count,
            waiting_requests: state.waiters.len(),
        }
    }

    /// Refill to capacity and reject every queued caller with
    /// [`AdmissionError::Reset`]
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        let now = Instant::now();
        state.tokens = self.shared.capacity;
        state.last_refill = now;
        state.window_count = 0;
        state.window_start = now;

        let rejected = state.waiters.len();
        for mut waiter in state.waiters.drain(..) {
            waiter.resolve(Err(AdmissionError::Reset));
        }
        if rejected > 0 {
            debug!(rejected, "Rate limiter reset rejected queued callers");
        }
    }
}
