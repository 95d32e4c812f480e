//! Error type definitions.
//!
//! This module defines all error types used throughout the crate. Admission
//! failures (no token, timeout) are not errors: they are reported as `false`
//! from the acquire calls.

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Error types for invalid bucket configuration.
///
/// Returned only at construction time. A running bucket never fails hard; it
/// degrades to slower admission instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BucketError {
    /// The token capacity was zero.
    #[error("Bucket capacity must be greater than zero")]
    ZeroCapacity,

    /// The token capacity exceeds what the token store can hold.
    #[error("Bucket capacity {capacity} exceeds the maximum of {max}")]
    CapacityTooLarge {
        /// Requested capacity
        capacity: usize,
        /// Largest supported capacity
        max: usize,
    },

    /// The initial rate was zero.
    #[error("Initial rate must be greater than zero tokens per second")]
    ZeroRate,

    /// The minimum rate was zero.
    #[error("Minimum rate must be greater than zero tokens per second")]
    ZeroMinRate,

    /// The initial rate falls outside `[min_rate, max_rate]`.
    #[error("Initial rate {rate} is outside the allowed range [{min}, {max}]")]
    RateOutOfRange {
        /// Requested initial rate
        rate: u64,
        /// Configured minimum rate
        min: u64,
        /// Configured maximum rate
        max: u64,
    },

    /// A load threshold is not a percentage.
    #[error("{name} threshold must be within [0, 100], got {value}")]
    InvalidThreshold {
        /// Which threshold ("CPU" or "Memory")
        name: &'static str,
        /// The rejected value
        value: f64,
    },

    /// The sliding window cannot hold any sample.
    #[error("Sliding window length must be greater than zero")]
    ZeroWindow,

    /// One of the task periods was zero.
    #[error("{0} period must be greater than zero")]
    ZeroPeriod(&'static str),

    /// The bucket was created outside a Tokio runtime.
    #[error("Adaptive token bucket must be created within a Tokio runtime")]
    NoRuntime,
}

/// Error types for host-metrics sampling.
///
/// The adaptation task treats every variant the same way: the cycle is
/// skipped and the target rate is left untouched.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The probe could not produce a sample.
    #[error("Metrics probe unavailable: {0}")]
    Unavailable(String),

    /// The probe returned a value outside `[0, 100]`.
    #[error("Metrics probe returned out-of-range {name} value: {value}")]
    OutOfRange {
        /// Which metric ("cpu" or "memory")
        name: &'static str,
        /// The rejected value
        value: f64,
    },

    /// The probe did not return within its deadline.
    #[error("Metrics probe timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An earlier sample overran its deadline and has not returned yet.
    #[error("Metrics probe still busy with an overdue sample")]
    StillRunning,

    /// The blocking probe task panicked or was cancelled.
    #[error("Metrics probe task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bucket_error_messages() {
        assert_eq!(
            BucketError::ZeroCapacity.to_string(),
            "Bucket capacity must be greater than zero"
        );
        assert_eq!(
            BucketError::RateOutOfRange {
                rate: 5,
                min: 10,
                max: 20
            }
            .to_string(),
            "Initial rate 5 is outside the allowed range [10, 20]"
        );
        assert_eq!(
            BucketError::InvalidThreshold {
                name: "CPU",
                value: 120.0
            }
            .to_string(),
            "CPU threshold must be within [0, 100], got 120"
        );
        assert_eq!(
            BucketError::ZeroPeriod("Snapshot").to_string(),
            "Snapshot period must be greater than zero"
        );
    }

    #[test]
    fn test_probe_error_messages() {
        let err = ProbeError::Unavailable("no /proc".to_string());
        assert_eq!(err.to_string(), "Metrics probe unavailable: no /proc");

        let err = ProbeError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "Metrics probe timed out after 2s");

        let err = ProbeError::OutOfRange {
            name: "cpu",
            value: -1.0,
        };
        assert!(err.to_string().contains("cpu"));

        assert_eq!(
            ProbeError::StillRunning.to_string(),
            "Metrics probe still busy with an overdue sample"
        );
    }
}
