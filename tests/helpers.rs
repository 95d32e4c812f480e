// Shared test helpers for bucket construction and scripted host load.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adaptive_bucket::{BucketConfig, HostLoad, MetricsProbe, ProbeError};

/// Probe whose reported load can be changed while the bucket runs.
#[derive(Clone)]
pub struct ScriptedProbe {
    load: Arc<Mutex<Option<HostLoad>>>,
    samples: Arc<AtomicUsize>,
}

#[allow(dead_code)] // Not every test file uses every helper
impl ScriptedProbe {
    /// Creates a probe reporting the given load.
    pub fn new(cpu: f64, mem: f64) -> Self {
        ScriptedProbe {
            load: Arc::new(Mutex::new(Some(HostLoad::new(cpu, mem)))),
            samples: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Changes the load reported from the next sample on.
    pub fn set(&self, cpu: f64, mem: f64) {
        *self.load.lock().unwrap() = Some(HostLoad::new(cpu, mem));
    }

    /// Makes every following sample fail.
    pub fn fail(&self) {
        *self.load.lock().unwrap() = None;
    }

    /// Number of samples taken so far.
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl MetricsProbe for ScriptedProbe {
    fn sample(&self, _duration: Duration) -> Result<HostLoad, ProbeError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        let load = *self.load.lock().unwrap();
        load.ok_or_else(|| ProbeError::Unavailable("scripted failure".to_string()))
    }
}

/// Configuration with short task periods so adaptation is observable in tests.
#[allow(dead_code)] // Used by other test files
pub fn fast_config(capacity: usize, rate: u64) -> BucketConfig {
    BucketConfig {
        snapshot_interval_ms: 20,
        adaptation_interval_ms: 50,
        probe_sample_ms: 1,
        ..BucketConfig::new(capacity, rate, 80.0, 80.0)
    }
}
