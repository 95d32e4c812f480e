//! Adaptive token bucket with load- and demand-based rate tuning.
//!
//! This module implements a token bucket whose refill rate follows host load:
//! - Tokens are added one at a time every `1 / rate` seconds, up to capacity
//! - Every acquire attempt counts as demand, granted or not
//! - Demand is snapshotted once per second into a 10-sample sliding window;
//!   the window maximum is the observed rate
//! - Every 10 seconds the host is sampled: overload lowers the rate by 10%,
//!   headroom with demand above the rate raises it by 10%
//!
//! This keeps admission in line with what the host can sustain while still
//! growing when real demand calls for it.

mod bucket;
mod policy;
mod tasks;
mod window;

use std::sync::atomic::AtomicU64;

use tokio::sync::{Mutex, Semaphore};

pub use bucket::AdaptiveTokenBucket;
pub use policy::{next_rate, LoadThresholds, RateDecision};
pub use window::SlidingWindow;

/// State shared between callers and the background tasks.
pub(crate) struct SharedState {
    /// Token store; one permit is one token
    pub(crate) tokens: Semaphore,
    pub(crate) capacity: usize,
    /// Acquire attempts since the last snapshot
    pub(crate) demand: AtomicU64,
    /// Maximum of the window, written only by the snapshot task
    pub(crate) observed: AtomicU64,
    pub(crate) window: Mutex<SlidingWindow>,
}

impl SharedState {
    pub(crate) fn new(capacity: usize, window_len: usize) -> Self {
        SharedState {
            tokens: Semaphore::new(0),
            capacity,
            demand: AtomicU64::new(0),
            observed: AtomicU64::new(0),
            window: Mutex::new(SlidingWindow::new(window_len)),
        }
    }
}
