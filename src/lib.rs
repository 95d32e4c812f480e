//! adaptive_bucket library: a self-tuning token bucket
//!
//! This library provides an admission-control primitive that gates how many
//! operations per second a caller may perform. The bucket refills at a target
//! rate and adjusts that rate on its own:
//! - Lowers the rate by 10% when CPU or memory usage exceeds its threshold
//! - Raises the rate by 10% when the host has headroom and real demand exceeds
//!   the current rate
//!
//! # Example
//!
//! ```no_run
//! use adaptive_bucket::AdaptiveTokenBucket;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bucket = AdaptiveTokenBucket::new(10, 500, 80.0, 80.0)?;
//!
//! if bucket.try_acquire() {
//!     // admitted
//! }
//!
//! if bucket.acquire_with_timeout(Duration::from_millis(100)).await {
//!     // admitted after waiting
//! }
//!
//! bucket.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! The bucket spawns its background tasks onto the current Tokio runtime, so it
//! must be constructed from within a runtime context.

#![warn(missing_docs)]

mod adaptive_token_bucket;
pub mod config;
mod error_handling;
pub mod initialization;
pub mod probe;

// Re-export public API
pub use adaptive_token_bucket::{
    next_rate, AdaptiveTokenBucket, LoadThresholds, RateDecision, SlidingWindow,
};
pub use config::{BucketConfig, LogFormat, LogLevel};
pub use error_handling::{BucketError, InitializationError, ProbeError};
pub use probe::{HostLoad, MetricsProbe, SystemProbe};
