//! Background tasks driving the bucket.
//!
//! Three independent loops share the bucket state:
//! - refill: adds one token per refill interval, following rate changes
//! - snapshot: moves the demand counter into the sliding window once per period
//! - adaptation: samples host load and adjusts the target rate
//!
//! Each loop exits when the bucket's cancellation token fires.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::policy::{next_rate, LoadThresholds};
use super::SharedState;
use crate::config::PROBE_GRACE_PERIOD;
use crate::error_handling::ProbeError;
use crate::probe::{HostLoad, MetricsProbe};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Time between two refills at `rate` tokens per second.
pub(super) fn refill_interval(rate: u64) -> Duration {
    Duration::from_nanos((NANOS_PER_SEC / rate.max(1)).max(1))
}

/// Scales `count` events seen over `period` to events per second.
pub(super) fn per_second(count: u64, period: Duration) -> u64 {
    let scaled = u128::from(count) * u128::from(NANOS_PER_SEC) / period.as_nanos().max(1);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Ticker whose first tick is one full period away.
fn delayed_ticker(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

/// Adds a token unless the store is full. Excess generation is discarded.
///
/// The refill task is the only writer, so the check cannot race with another add.
fn add_token(tokens: &Semaphore, capacity: usize) -> bool {
    if tokens.available_permits() < capacity {
        tokens.add_permits(1);
        true
    } else {
        false
    }
}

/// Refill loop.
///
/// Rate changes arrive on `rate_rx`. The loop drops its ticker and builds a
/// new one for the new interval in the same step, so no tick from the old
/// schedule can fire after the switch and no two schedules ever overlap.
pub(super) async fn run_refill(
    state: Arc<SharedState>,
    mut rate_rx: watch::Receiver<u64>,
    shutdown: CancellationToken,
) {
    let rate = *rate_rx.borrow_and_update();
    // Burst catches up on missed ticks, which keeps rates above the timer
    // resolution accurate; the capacity check bounds the catch-up
    let mut ticker = delayed_ticker(refill_interval(rate));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = rate_rx.changed() => {
                if changed.is_err() {
                    // Adaptation task is gone, which only happens on shutdown
                    break;
                }
                let rate = *rate_rx.borrow_and_update();
                let period = refill_interval(rate);
                ticker = delayed_ticker(period);
                log::debug!("Refill rescheduled: {} tokens/s (every {:?})", rate, period);
            }
            _ = ticker.tick() => {
                add_token(&state.tokens, state.capacity);
            }
        }
    }

    log::debug!("Refill task shutting down");
}

/// Window-snapshot loop.
///
/// Swaps the demand counter to zero and records the previous value, so every
/// increment lands in exactly one sample. Samples are stored per second
/// whatever the period, so the observed rate compares directly with the
/// target rate.
pub(super) async fn run_snapshot(
    state: Arc<SharedState>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = delayed_ticker(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let demand = state.demand.swap(0, Ordering::AcqRel);
                let observed = state.window.lock().await.record(per_second(demand, period));
                state.observed.store(observed, Ordering::Release);
                log::trace!("Demand snapshot: {} requests, observed rate {}/s", demand, observed);
            }
        }
    }

    log::debug!("Snapshot task shutting down");
}

/// Settings for the adaptation loop.
pub(super) struct AdaptationSettings {
    pub(super) period: Duration,
    pub(super) probe_sample: Duration,
    pub(super) thresholds: LoadThresholds,
    pub(super) min_rate: u64,
    pub(super) max_rate: u64,
}

/// Rate-adaptation loop.
///
/// Sole owner of the rate sender. A failed, panicking or overdue probe skips
/// the cycle and leaves the rate untouched.
pub(super) async fn run_adaptation(
    state: Arc<SharedState>,
    probe: Arc<dyn MetricsProbe>,
    rate_tx: watch::Sender<u64>,
    settings: AdaptationSettings,
    shutdown: CancellationToken,
) {
    let mut ticker = delayed_ticker(settings.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sampler = Sampler::new(probe, PROBE_GRACE_PERIOD);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sampled = tokio::select! {
            _ = shutdown.cancelled() => break,
            sampled = sampler.sample(settings.probe_sample) => sampled,
        };

        let load = match sampled {
            Ok(load) => load,
            Err(e) => {
                log::warn!("Skipping rate adaptation: {}", e);
                continue;
            }
        };

        let current = *rate_tx.borrow();
        let observed = state.observed.load(Ordering::Acquire);
        let decision = next_rate(
            current,
            observed,
            &load,
            &settings.thresholds,
            settings.min_rate,
            settings.max_rate,
        );

        log::info!(
            "Memory usage {:.1}%, CPU usage {:.1}%, target rate {}/s, observed rate {}/s",
            load.mem_percent,
            load.cpu_percent,
            decision.rate(),
            observed
        );

        if let Some(new_rate) = decision.changed_rate() {
            log::info!(
                "Adaptive token bucket: {:?}, refill rate {} → {}",
                decision,
                current,
                new_rate
            );
            rate_tx.send_replace(new_rate);
        }
    }

    log::debug!("Adaptation task shutting down");
}

/// Runs the probe on the blocking pool with a deadline.
///
/// A blocking call cannot be cancelled, so an overdue sample is kept and no
/// new one starts until it returns. At most one probe thread is busy at a time.
struct Sampler {
    probe: Arc<dyn MetricsProbe>,
    grace: Duration,
    overdue: Option<JoinHandle<Result<HostLoad, ProbeError>>>,
}

impl Sampler {
    fn new(probe: Arc<dyn MetricsProbe>, grace: Duration) -> Self {
        Sampler {
            probe,
            grace,
            overdue: None,
        }
    }

    async fn sample(&mut self, duration: Duration) -> Result<HostLoad, ProbeError> {
        if let Some(handle) = self.overdue.take() {
            if !handle.is_finished() {
                self.overdue = Some(handle);
                return Err(ProbeError::StillRunning);
            }
            // Late result of an abandoned cycle, too stale to act on
        }

        let probe = Arc::clone(&self.probe);
        let mut handle = tokio::task::spawn_blocking(move || probe.sample(duration));

        let deadline = duration + self.grace;
        match tokio::time::timeout(deadline, &mut handle).await {
            Ok(joined) => {
                let load = joined??;
                load.validate()
            }
            Err(_) => {
                self.overdue = Some(handle);
                Err(ProbeError::Timeout(deadline))
            }
        }
    }
}
