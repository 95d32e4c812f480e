//! Host-metrics probing.
//!
//! The bucket consults a [`MetricsProbe`] once per adaptation cycle. The probe
//! may block for up to the requested duration while it observes the host; the
//! bucket runs it on Tokio's blocking pool so the refill and snapshot tasks
//! keep running meanwhile.
//!
//! [`SystemProbe`] is the default implementation. Any
//! `Fn(Duration) -> Result<HostLoad, ProbeError>` closure is also a probe,
//! which is convenient for fixed or scripted load in tests.

mod system;

use std::time::Duration;

use crate::error_handling::ProbeError;

pub use system::SystemProbe;

/// One reading of host load, both values in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostLoad {
    /// CPU usage across all cores, in `[0, 100]`
    pub cpu_percent: f64,
    /// Used memory as a share of total memory, in `[0, 100]`
    pub mem_percent: f64,
}

impl HostLoad {
    /// Creates a reading.
    pub fn new(cpu_percent: f64, mem_percent: f64) -> Self {
        Self {
            cpu_percent,
            mem_percent,
        }
    }

    /// Rejects readings that are not percentages (including NaN).
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::OutOfRange` naming the offending metric.
    pub fn validate(self) -> Result<Self, ProbeError> {
        if !(0.0..=100.0).contains(&self.cpu_percent) {
            return Err(ProbeError::OutOfRange {
                name: "cpu",
                value: self.cpu_percent,
            });
        }
        if !(0.0..=100.0).contains(&self.mem_percent) {
            return Err(ProbeError::OutOfRange {
                name: "memory",
                value: self.mem_percent,
            });
        }
        Ok(self)
    }
}

/// Source of host CPU and memory usage.
pub trait MetricsProbe: Send + Sync + 'static {
    /// Observes the host for about `duration` and reports its load.
    ///
    /// May block the calling thread for the whole duration.
    fn sample(&self, duration: Duration) -> Result<HostLoad, ProbeError>;
}

impl<F> MetricsProbe for F
where
    F: Fn(Duration) -> Result<HostLoad, ProbeError> + Send + Sync + 'static,
{
    fn sample(&self, duration: Duration) -> Result<HostLoad, ProbeError> {
        self(duration)
    }
}
