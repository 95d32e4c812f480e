//! Adaptive token bucket implementation.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::policy::LoadThresholds;
use super::tasks::{refill_interval, run_adaptation, run_refill, run_snapshot, AdaptationSettings};
use super::SharedState;
use crate::config::BucketConfig;
use crate::error_handling::BucketError;
use crate::probe::{MetricsProbe, SystemProbe};

/// Token bucket that tunes its own refill rate.
///
/// The store starts empty; tokens arrive only through the refill task. Every
/// acquire attempt, successful or not, counts as demand so the adaptation
/// loop sees real pressure rather than granted throughput.
///
/// Dropping the bucket cancels its background tasks. Use
/// [`shutdown`](Self::shutdown) to also wait for them to finish.
pub struct AdaptiveTokenBucket {
    state: Arc<SharedState>,
    rate_rx: watch::Receiver<u64>,
    thresholds: LoadThresholds,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AdaptiveTokenBucket {
    /// Creates a bucket probing the local host, with default task timings.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum buffered tokens (> 0)
    /// * `initial_rate` - Starting refill rate in tokens per second (> 0)
    /// * `cpu_threshold` - CPU usage warning threshold in percent
    /// * `mem_threshold` - Memory usage warning threshold in percent
    ///
    /// # Errors
    ///
    /// Returns a `BucketError` if a parameter is invalid or no Tokio runtime is
    /// available to run the background tasks.
    pub fn new(
        capacity: usize,
        initial_rate: u64,
        cpu_threshold: f64,
        mem_threshold: f64,
    ) -> Result<Self, BucketError> {
        Self::with_config(
            BucketConfig::new(capacity, initial_rate, cpu_threshold, mem_threshold),
            SystemProbe::new(),
        )
    }

    /// Creates a bucket from a full configuration and a custom probe.
    ///
    /// # Errors
    ///
    /// Returns a `BucketError` if the configuration is invalid or no Tokio
    /// runtime is available.
    pub fn with_config<P: MetricsProbe>(config: BucketConfig, probe: P) -> Result<Self, BucketError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| BucketError::NoRuntime)?;

        let state = Arc::new(SharedState::new(config.capacity, config.window_len));
        let (rate_tx, rate_rx) = watch::channel(config.initial_rate);
        let thresholds = LoadThresholds::new(config.cpu_threshold, config.mem_threshold);
        let shutdown = CancellationToken::new();

        let settings = AdaptationSettings {
            period: config.adaptation_interval(),
            probe_sample: config.probe_sample(),
            thresholds,
            min_rate: config.min_rate,
            max_rate: config.max_rate(),
        };

        let tasks = vec![
            runtime.spawn(run_refill(
                Arc::clone(&state),
                rate_rx.clone(),
                shutdown.clone(),
            )),
            runtime.spawn(run_snapshot(
                Arc::clone(&state),
                config.snapshot_interval(),
                shutdown.clone(),
            )),
            runtime.spawn(run_adaptation(
                Arc::clone(&state),
                Arc::new(probe),
                rate_tx,
                settings,
                shutdown.clone(),
            )),
        ];

        log::debug!(
            "Adaptive token bucket started: capacity {}, rate {}/s, CPU threshold {}%, memory threshold {}%",
            config.capacity,
            config.initial_rate,
            config.cpu_threshold,
            config.mem_threshold
        );

        Ok(AdaptiveTokenBucket {
            state,
            rate_rx,
            thresholds,
            shutdown,
            tasks: Mutex::new(tasks),
        })
    }

    /// Takes a token if one is available, without waiting.
    ///
    /// Always counts toward demand. Returns `false` when the store is empty or
    /// the bucket has been shut down.
    pub fn try_acquire(&self) -> bool {
        self.state.demand.fetch_add(1, Ordering::AcqRel);
        match self.state.tokens.try_acquire() {
            Ok(permit) => {
                // Consumed tokens never return to the store
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Waits up to `timeout` for a token.
    ///
    /// Always counts toward demand. The caller is woken when a token is added,
    /// so waiting costs nothing between refills. Returns `false` on timeout or
    /// if the bucket is shut down while waiting.
    pub async fn acquire_with_timeout(&self, timeout: Duration) -> bool {
        self.state.demand.fetch_add(1, Ordering::AcqRel);
        match tokio::time::timeout(timeout, self.state.tokens.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }

    /// Maximum number of buffered tokens.
    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Tokens currently in the store.
    pub fn available_tokens(&self) -> usize {
        self.state.tokens.available_permits()
    }

    /// Current target rate in tokens per second.
    pub fn current_rate(&self) -> u64 {
        *self.rate_rx.borrow()
    }

    /// Time between refills at the current rate.
    pub fn refill_interval(&self) -> Duration {
        refill_interval(self.current_rate())
    }

    /// Worst-case per-second demand over the sliding window.
    pub fn observed_rate(&self) -> u64 {
        self.state.observed.load(Ordering::Acquire)
    }

    /// Acquire attempts counted since the last snapshot.
    pub fn pending_demand(&self) -> u64 {
        self.state.demand.load(Ordering::Acquire)
    }

    /// Demand samples in the sliding window in requests per second, oldest first.
    pub async fn demand_samples(&self) -> Vec<u64> {
        self.state.window.lock().await.samples()
    }

    /// CPU and memory thresholds the bucket adapts against.
    pub fn thresholds(&self) -> LoadThresholds {
        self.thresholds
    }

    /// Receiver that observes target-rate changes made after this call.
    pub fn subscribe_rate(&self) -> watch::Receiver<u64> {
        let mut rates = self.rate_rx.clone();
        rates.borrow_and_update();
        rates
    }

    /// Whether [`shutdown`](Self::shutdown) has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops all background tasks and waits for them to exit.
    ///
    /// Waiting acquirers are released with `false`, and later acquires fail.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.stop();

        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("Adaptive token bucket task ended abnormally: {}", e);
            }
        }
    }

    fn stop(&self) {
        self.shutdown.cancel();
        self.state.tokens.close();
    }
}

impl Drop for AdaptiveTokenBucket {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ProbeError;
    use crate::probe::HostLoad;
    use tokio::time::{sleep, timeout, Instant};

    fn fixed_probe(cpu: f64, mem: f64) -> impl MetricsProbe {
        move |_: Duration| -> Result<HostLoad, ProbeError> { Ok(HostLoad::new(cpu, mem)) }
    }

    fn fast_config(capacity: usize, rate: u64) -> BucketConfig {
        BucketConfig {
            snapshot_interval_ms: 20,
            adaptation_interval_ms: 50,
            probe_sample_ms: 1,
            ..BucketConfig::new(capacity, rate, 80.0, 80.0)
        }
    }

    #[tokio::test]
    async fn test_new_starts_empty() {
        let bucket = AdaptiveTokenBucket::with_config(
            BucketConfig::new(10, 5, 80.0, 80.0),
            fixed_probe(10.0, 10.0),
        )
        .unwrap();

        assert_eq!(bucket.capacity(), 10);
        assert_eq!(bucket.available_tokens(), 0);
        assert_eq!(bucket.current_rate(), 5);
        assert_eq!(bucket.refill_interval(), Duration::from_millis(200));
        assert_eq!(bucket.observed_rate(), 0);
        assert_eq!(bucket.thresholds(), LoadThresholds::new(80.0, 80.0));
        assert!(!bucket.try_acquire());

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_parameters() {
        assert!(matches!(
            AdaptiveTokenBucket::new(0, 10, 80.0, 80.0),
            Err(BucketError::ZeroCapacity)
        ));
        assert!(matches!(
            AdaptiveTokenBucket::new(10, 0, 80.0, 80.0),
            Err(BucketError::ZeroRate)
        ));
        assert!(matches!(
            AdaptiveTokenBucket::new(10, 10, 80.0, 180.0),
            Err(BucketError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = AdaptiveTokenBucket::with_config(
            BucketConfig::new(10, 10, 80.0, 80.0),
            fixed_probe(10.0, 10.0),
        );
        assert!(matches!(result, Err(BucketError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_every_attempt_counts_as_demand() {
        let config = BucketConfig {
            snapshot_interval_ms: 60_000,
            ..BucketConfig::new(10, 1, 80.0, 80.0)
        };
        let bucket = AdaptiveTokenBucket::with_config(config, fixed_probe(10.0, 10.0)).unwrap();

        for _ in 0..7 {
            assert!(!bucket.try_acquire());
        }
        assert!(
            !bucket
                .acquire_with_timeout(Duration::from_millis(10))
                .await
        );
        assert_eq!(bucket.pending_demand(), 8);

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_acquire_with_timeout_wakes_on_refill() {
        let bucket = AdaptiveTokenBucket::with_config(
            BucketConfig::new(1, 20, 80.0, 80.0),
            fixed_probe(10.0, 10.0),
        )
        .unwrap();

        let start = Instant::now();
        assert!(bucket.acquire_with_timeout(Duration::from_secs(2)).await);
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "Waiter should be woken by the first refill (~50ms), took {:?}",
            start.elapsed()
        );

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_snapshot_records_demand() {
        let bucket =
            AdaptiveTokenBucket::with_config(fast_config(10, 1), fixed_probe(70.0, 70.0)).unwrap();

        for _ in 0..25 {
            bucket.try_acquire();
        }
        sleep(Duration::from_millis(35)).await;

        // 25 attempts in one 20ms period is 1250 per second
        assert_eq!(bucket.observed_rate(), 1250);
        assert_eq!(bucket.demand_samples().await.first(), Some(&1250));
        assert_eq!(bucket.pending_demand(), 0);

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_overload_decreases_rate() {
        let bucket =
            AdaptiveTokenBucket::with_config(fast_config(10, 100), fixed_probe(95.0, 10.0))
                .unwrap();
        let mut rates = bucket.subscribe_rate();

        timeout(Duration::from_secs(2), rates.changed())
            .await
            .expect("rate should change")
            .unwrap();
        assert_eq!(*rates.borrow_and_update(), 90);
        assert!(bucket.current_rate() <= 90);

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_headroom_and_demand_increase_rate() {
        let bucket =
            AdaptiveTokenBucket::with_config(fast_config(10, 10), fixed_probe(10.0, 10.0))
                .unwrap();
        let mut rates = bucket.subscribe_rate();

        // Demand well above 10/s lands in the first snapshot
        for _ in 0..50 {
            bucket.try_acquire();
        }

        timeout(Duration::from_secs(2), rates.changed())
            .await
            .expect("rate should change")
            .unwrap();
        assert_eq!(*rates.borrow_and_update(), 11);

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_demand_keeps_rate() {
        let bucket =
            AdaptiveTokenBucket::with_config(fast_config(10, 10), fixed_probe(10.0, 10.0))
                .unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(bucket.current_rate(), 10);

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_probe_failure_skips_cycle() {
        let probe = |_: Duration| -> Result<HostLoad, ProbeError> {
            Err(ProbeError::Unavailable("metrics offline".to_string()))
        };
        let bucket = AdaptiveTokenBucket::with_config(fast_config(10, 100), probe).unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(bucket.current_rate(), 100);
        assert!(!bucket.is_shutdown());

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_rate_respects_min_rate() {
        let config = BucketConfig {
            min_rate: 95,
            ..fast_config(10, 100)
        };
        let bucket = AdaptiveTokenBucket::with_config(config, fixed_probe(99.0, 99.0)).unwrap();

        sleep(Duration::from_millis(300)).await;
        assert_eq!(bucket.current_rate(), 95);

        bucket.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_releases_waiters_and_stops_refill() {
        let bucket = Arc::new(
            AdaptiveTokenBucket::with_config(
                BucketConfig::new(10, 1, 80.0, 80.0),
                fixed_probe(10.0, 10.0),
            )
            .unwrap(),
        );

        let waiter = {
            let bucket = Arc::clone(&bucket);
            tokio::spawn(async move { bucket.acquire_with_timeout(Duration::from_secs(30)).await })
        };
        sleep(Duration::from_millis(20)).await;

        bucket.shutdown().await;
        assert!(bucket.is_shutdown());

        let acquired = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be released")
            .unwrap();
        assert!(!acquired);
        assert!(!bucket.try_acquire());

        // Second call is a no-op
        bucket.shutdown().await;
    }
}
