//! Rate-adaptation policy.
//!
//! Decides the next target rate from one host-load sample:
//! - Overloaded (CPU or memory above its threshold): decrease by 10%
//! - Headroom (both below 80% of their thresholds) and observed demand above
//!   the target rate: increase by 10%
//! - Otherwise: keep the current rate
//!
//! CPU is compared against its own threshold and memory against its own.

use crate::config::{HEADROOM_DIVISOR, RATE_STEP_DIVISOR};
use crate::probe::HostLoad;

/// CPU and memory warning thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadThresholds {
    /// CPU usage threshold
    pub cpu_percent: f64,
    /// Memory usage threshold
    pub mem_percent: f64,
}

impl LoadThresholds {
    /// Creates a threshold pair.
    pub fn new(cpu_percent: f64, mem_percent: f64) -> Self {
        Self {
            cpu_percent,
            mem_percent,
        }
    }

    /// Either metric is above its threshold.
    pub fn is_exceeded_by(&self, load: &HostLoad) -> bool {
        load.cpu_percent > self.cpu_percent || load.mem_percent > self.mem_percent
    }

    /// Both metrics are comfortably below their thresholds.
    pub fn has_headroom_for(&self, load: &HostLoad) -> bool {
        load.cpu_percent < headroom_limit(self.cpu_percent)
            && load.mem_percent < headroom_limit(self.mem_percent)
    }
}

fn headroom_limit(threshold: f64) -> f64 {
    threshold - threshold / HEADROOM_DIVISOR
}

/// Outcome of one adaptation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Host is overloaded; the rate goes down.
    Decrease {
        /// Rate before the cycle
        from: u64,
        /// Rate after the cycle
        to: u64,
    },
    /// Demand exceeds the rate and the host has headroom; the rate goes up.
    Increase {
        /// Rate before the cycle
        from: u64,
        /// Rate after the cycle
        to: u64,
    },
    /// Rate stays as it is.
    Hold(u64),
}

impl RateDecision {
    /// The rate in effect after this decision.
    pub fn rate(&self) -> u64 {
        match *self {
            RateDecision::Decrease { to, .. } | RateDecision::Increase { to, .. } => to,
            RateDecision::Hold(rate) => rate,
        }
    }

    /// The new rate, if the decision changes it.
    pub fn changed_rate(&self) -> Option<u64> {
        match *self {
            RateDecision::Hold(_) => None,
            _ => Some(self.rate()),
        }
    }
}

/// Computes the next target rate.
///
/// Both checks run against the same `load`; the headroom check sees the
/// outcome of the overload check. The result is clamped into
/// `[min_rate, max_rate]` with `min_rate` raised to at least 1, so the refill
/// interval is always finite.
pub fn next_rate(
    current: u64,
    observed: u64,
    load: &HostLoad,
    thresholds: &LoadThresholds,
    min_rate: u64,
    max_rate: u64,
) -> RateDecision {
    let mut rate = current;

    if thresholds.is_exceeded_by(load) {
        rate -= rate / RATE_STEP_DIVISOR;
    }

    if thresholds.has_headroom_for(load) && observed > rate {
        rate = rate.saturating_add(rate / RATE_STEP_DIVISOR);
    }

    let min_rate = min_rate.max(1);
    let rate = rate.clamp(min_rate, max_rate.max(min_rate));

    match rate.cmp(&current) {
        std::cmp::Ordering::Less => RateDecision::Decrease {
            from: current,
            to: rate,
        },
        std::cmp::Ordering::Greater => RateDecision::Increase {
            from: current,
            to: rate,
        },
        std::cmp::Ordering::Equal => RateDecision::Hold(current),
    }
}
