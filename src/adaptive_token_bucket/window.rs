//! Sliding window of per-second demand samples.

use std::collections::VecDeque;

use crate::config::WINDOW_LEN;

/// Bounded FIFO of recent demand samples.
///
/// The observed rate is the largest sample held, i.e. the worst-case demand
/// over the last `capacity` snapshot periods. Not synchronized on its own;
/// the bucket keeps it behind a mutex.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl SlidingWindow {
    /// Creates an empty window holding at most `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        SlidingWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample at the tail without enforcing the capacity.
    pub fn push(&mut self, sample: u64) {
        self.samples.push_back(sample);
    }

    /// Drops the oldest samples until at most `n` remain. No-op if already small enough.
    pub fn trim_to(&mut self, n: usize) {
        while self.samples.len() > n {
            self.samples.pop_front();
        }
    }

    /// Trims to make room, then appends, keeping `len() <= capacity()`.
    ///
    /// Returns the window maximum after the sample is added.
    pub fn record(&mut self, sample: u64) -> u64 {
        self.trim_to(self.capacity - 1);
        self.push(sample);
        self.max()
    }

    /// Largest sample currently held, or 0 for an empty window.
    pub fn max(&self) -> u64 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples kept by [`record`](Self::record).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(WINDOW_LEN)
    }
}
