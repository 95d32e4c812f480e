//! Configuration and constants.
//!
//! This module provides:
//! - Configuration constants (task periods, window length, rate step)
//! - Logging option types
//! - The bucket configuration and its validation

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{BucketConfig, LogFormat, LogLevel};
