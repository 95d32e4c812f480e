//! Host probe backed by `sysinfo`.

use std::sync::Mutex;
use std::time::Duration;

use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

use super::{HostLoad, MetricsProbe};
use crate::error_handling::ProbeError;

/// Reads CPU and memory usage of the local host.
///
/// CPU usage is the average over the sampling duration: the probe refreshes
/// the counters, sleeps, then refreshes again.
pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    /// Creates a probe. No host data is read until the first sample.
    pub fn new() -> Self {
        SystemProbe {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProbe for SystemProbe {
    fn sample(&self, duration: Duration) -> Result<HostLoad, ProbeError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| ProbeError::Unavailable("system probe lock poisoned".to_string()))?;

        system.refresh_cpu_usage();
        // sysinfo needs at least this long between refreshes to compute usage
        std::thread::sleep(duration.max(MINIMUM_CPU_UPDATE_INTERVAL));
        system.refresh_cpu_usage();
        let cpu_percent = f64::from(system.global_cpu_usage());

        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(ProbeError::Unavailable(
                "total memory reported as zero".to_string(),
            ));
        }
        // Safe cast: memory sizes in bytes fit comfortably in f64 precision for a percentage
        #[allow(clippy::cast_precision_loss)]
        let mem_percent = system.used_memory() as f64 / total as f64 * 100.0;

        // CPU usage can overshoot 100 briefly on some platforms
        HostLoad::new(cpu_percent.clamp(0.0, 100.0), mem_percent.clamp(0.0, 100.0)).validate()
    }
}
