//! Error handling.
//!
//! This module provides the error types for:
//! - Logger initialization
//! - Bucket construction (invalid configuration)
//! - Host-metrics sampling
//!
//! Running out of tokens and timing out while waiting are routine backpressure
//! and are reported as boolean outcomes, not errors.

mod types;

// Re-export public API
pub use types::{BucketError, InitializationError, ProbeError};
