//! Configuration constants.
//!
//! This module defines the default timings and limits used by the bucket and
//! its background tasks.

use std::time::Duration;

/// Number of per-second demand samples kept in the sliding window
pub const WINDOW_LEN: usize = 10;

/// Period of the window-snapshot task
/// Demand is counted per second, so the snapshot runs once per second
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// Period of the rate-adaptation task
pub const ADAPTATION_INTERVAL: Duration = Duration::from_secs(10);

/// How long the probe observes CPU usage before reporting a sample
/// One second gives a representative reading without delaying the decision
pub const PROBE_SAMPLE_DURATION: Duration = Duration::from_secs(1);

/// Extra time a probe may take beyond its sample duration before the cycle is
/// abandoned
pub const PROBE_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Lowest rate the adaptation task may set (tokens per second)
pub const DEFAULT_MIN_RATE: u64 = 1;

/// Rate change step: the rate moves by `rate / RATE_STEP_DIVISOR` per cycle (10%)
pub const RATE_STEP_DIVISOR: u64 = 10;

/// Headroom margin: a metric has headroom below `threshold - threshold / HEADROOM_DIVISOR` (80%)
pub const HEADROOM_DIVISOR: f64 = 5.0;

/// Default CPU warning threshold in percent
pub const DEFAULT_CPU_THRESHOLD: f64 = 80.0;

/// Default memory warning threshold in percent
pub const DEFAULT_MEM_THRESHOLD: f64 = 80.0;
