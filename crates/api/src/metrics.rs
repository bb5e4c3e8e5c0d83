use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    rejected_requests: AtomicUsize,
    requests_with_chosen: AtomicUsize,
    cache_hits: AtomicUsize,

    // Timing (in microseconds)
    total_match_time_us: AtomicU64,
}

/// Final state of one match request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Matched { chosen: bool },
    /// Bad input, answered with 400.
    Rejected,
    /// Search backend failure.
    Failed,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            rejected_requests: AtomicUsize::new(0),
            requests_with_chosen: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            total_match_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_request(&self, outcome: Outcome, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_match_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        match outcome {
            Outcome::Matched { chosen } => {
                self.successful_requests.fetch_add(1, Ordering::Relaxed);
                if chosen {
                    self.requests_with_chosen.fetch_add(1, Ordering::Relaxed);
                }
            }
            Outcome::Rejected => {
                self.rejected_requests.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failed => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_us = self.total_match_time_us.load(Ordering::Relaxed) as f64;
        let avg_match_time_ms = if total_requests > 0 {
            total_us / total_requests as f64 / 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            requests_with_chosen: self.requests_with_chosen.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            avg_match_time_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub rejected_requests: usize,
    pub requests_with_chosen: usize,
    pub cache_hits: usize,
    pub avg_match_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
