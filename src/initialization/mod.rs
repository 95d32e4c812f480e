//! Application-side initialization.
//!
//! The bucket itself needs no global setup; this module provides the logger
//! configuration that host applications can use to surface the bucket's
//! adaptation messages.

mod logger;

// Re-export public API
pub use logger::init_logger_with;
