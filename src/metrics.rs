// Runtime metrics module
//
// Lightweight counters for the protocol client and the sync scheduler

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by the protocol client and the scheduler
///
/// Uses atomic operations so it can be updated from any task without locks.
/// Logged on shutdown via [`log_summary`](Self::log_summary).
#[derive(Debug)]
pub struct Metrics {
    /// HTTP requests handed to the transport (follow-ups included)
    pub requests_issued: AtomicU64,

    /// Redirects that produced a follow-up request
    pub redirects_followed: AtomicU64,

    /// Redirect signals dropped because the hop limit was exceeded
    pub redirect_loops_capped: AtomicU64,

    /// Discovery completions without body and without error
    pub duplicate_completions_ignored: AtomicU64,

    pub syncs_started: AtomicU64,

    pub syncs_finished: AtomicU64,

    pub syncs_aborted: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_issued: AtomicU64::new(0),
            redirects_followed: AtomicU64::new(0),
            redirect_loops_capped: AtomicU64::new(0),
            duplicate_completions_ignored: AtomicU64::new(0),
            syncs_started: AtomicU64::new(0),
            syncs_finished: AtomicU64::new(0),
            syncs_aborted: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_request_issued(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redirect_followed(&self) {
        self.redirects_followed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redirect_loop_capped(&self) {
        self.redirect_loops_capped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_completion(&self) {
        self.duplicate_completions_ignored
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_started(&self) {
        self.syncs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_finished(&self) {
        self.syncs_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_aborted(&self) {
        self.syncs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Requests: {} issued, {} redirects followed, {} redirect loops capped, {} duplicate completions",
            self.requests_issued.load(Ordering::Relaxed),
            self.redirects_followed.load(Ordering::Relaxed),
            self.redirect_loops_capped.load(Ordering::Relaxed),
            self.duplicate_completions_ignored.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Syncs: {} started, {} finished, {} aborted",
            self.syncs_started.load(Ordering::Relaxed),
            self.syncs_finished.load(Ordering::Relaxed),
            self.syncs_aborted.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
