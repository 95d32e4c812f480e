//! Configuration types.
//!
//! This module defines the logging options and the bucket configuration.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::config::constants::{
    ADAPTATION_INTERVAL, DEFAULT_CPU_THRESHOLD, DEFAULT_MEM_THRESHOLD, DEFAULT_MIN_RATE,
    PROBE_SAMPLE_DURATION, SNAPSHOT_INTERVAL, WINDOW_LEN,
};
use crate::error_handling::BucketError;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Bucket configuration.
///
/// Only the first four fields are needed for the common case; the rest tune
/// the background tasks. Deserializes with defaults for missing fields so it
/// can be embedded in a host application's own configuration file.
///
/// # Examples
///
/// ```
/// use adaptive_bucket::BucketConfig;
///
/// let config = BucketConfig {
///     capacity: 50,
///     initial_rate: 200,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BucketConfig {
    /// Maximum number of buffered tokens
    pub capacity: usize,

    /// Starting refill rate in tokens per second
    pub initial_rate: u64,

    /// CPU usage warning threshold in percent
    pub cpu_threshold: f64,

    /// Memory usage warning threshold in percent
    pub mem_threshold: f64,

    /// Lowest rate adaptation may reach (tokens per second, at least 1)
    pub min_rate: u64,

    /// Highest rate adaptation may reach (unbounded when `None`)
    pub max_rate: Option<u64>,

    /// Number of per-second demand samples kept for the observed rate
    pub window_len: usize,

    /// Window-snapshot period in milliseconds. Each sample is scaled to
    /// requests per second, so any period yields a per-second observed rate
    pub snapshot_interval_ms: u64,

    /// Rate-adaptation period in milliseconds
    pub adaptation_interval_ms: u64,

    /// How long the probe observes the host per adaptation cycle, in milliseconds
    pub probe_sample_ms: u64,
}

impl BucketConfig {
    /// Creates a configuration with the given core parameters and default timings.
    pub fn new(capacity: usize, initial_rate: u64, cpu_threshold: f64, mem_threshold: f64) -> Self {
        Self {
            capacity,
            initial_rate,
            cpu_threshold,
            mem_threshold,
            ..Default::default()
        }
    }

    /// Checks every field, returning the first problem found.
    ///
    /// # Errors
    ///
    /// Returns a `BucketError` describing the invalid field.
    pub fn validate(&self) -> Result<(), BucketError> {
        if self.capacity == 0 {
            return Err(BucketError::ZeroCapacity);
        }
        if self.capacity > Semaphore::MAX_PERMITS {
            return Err(BucketError::CapacityTooLarge {
                capacity: self.capacity,
                max: Semaphore::MAX_PERMITS,
            });
        }
        if self.initial_rate == 0 {
            return Err(BucketError::ZeroRate);
        }
        if self.min_rate == 0 {
            return Err(BucketError::ZeroMinRate);
        }
        let max = self.max_rate();
        if self.initial_rate < self.min_rate || self.initial_rate > max {
            return Err(BucketError::RateOutOfRange {
                rate: self.initial_rate,
                min: self.min_rate,
                max,
            });
        }
        validate_threshold("CPU", self.cpu_threshold)?;
        validate_threshold("Memory", self.mem_threshold)?;
        if self.window_len == 0 {
            return Err(BucketError::ZeroWindow);
        }
        if self.snapshot_interval_ms == 0 {
            return Err(BucketError::ZeroPeriod("Snapshot"));
        }
        if self.adaptation_interval_ms == 0 {
            return Err(BucketError::ZeroPeriod("Adaptation"));
        }
        Ok(())
    }

    /// Upper bound for the adapted rate.
    pub fn max_rate(&self) -> u64 {
        self.max_rate.unwrap_or(u64::MAX)
    }

    /// Window-snapshot period.
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    /// Rate-adaptation period.
    pub fn adaptation_interval(&self) -> Duration {
        Duration::from_millis(self.adaptation_interval_ms)
    }

    /// Probe sampling duration.
    pub fn probe_sample(&self) -> Duration {
        Duration::from_millis(self.probe_sample_ms)
    }
}

fn validate_threshold(name: &'static str, value: f64) -> Result<(), BucketError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(BucketError::InvalidThreshold { name, value })
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            initial_rate: 100,
            cpu_threshold: DEFAULT_CPU_THRESHOLD,
            mem_threshold: DEFAULT_MEM_THRESHOLD,
            min_rate: DEFAULT_MIN_RATE,
            max_rate: None,
            window_len: WINDOW_LEN,
            snapshot_interval_ms: SNAPSHOT_INTERVAL.as_millis() as u64,
            adaptation_interval_ms: ADAPTATION_INTERVAL.as_millis() as u64,
            probe_sample_ms: PROBE_SAMPLE_DURATION.as_millis() as u64,
        }
    }
}
