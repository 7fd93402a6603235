//! Lock-free session statistics and periodic reporting
//!
//! Uses atomics so the submission path never contends with the reporter or
//! the stats endpoint. All counters use Relaxed ordering intentionally: they
//! are statistical only and must not be used for coordination.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Lock-free session statistics collector
pub struct Stats {
    /// Captures that aggregated names (monotonic)
    captures_total: AtomicU64,
    /// Captures that failed with a service error (monotonic)
    captures_failed: AtomicU64,
    /// Captures whose response normalized to nothing (monotonic)
    captures_empty: AtomicU64,
    /// Name increments applied to the roster (monotonic)
    names_recorded_total: AtomicU64,
    /// Export files written (monotonic)
    exports_total: AtomicU64,
    /// Sum of extraction latencies in ms (reset on report)
    extract_latency_sum_ms: AtomicU64,
    /// Max extraction latency in ms (reset on report)
    extract_latency_max_ms: AtomicU64,
    /// Extractions since last report (reset on report)
    extractions_since_report: AtomicU64,
    /// Session start, for uptime reporting
    started_at: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            captures_total: AtomicU64::new(0),
            captures_failed: AtomicU64::new(0),
            captures_empty: AtomicU64::new(0),
            names_recorded_total: AtomicU64::new(0),
            exports_total: AtomicU64::new(0),
            extract_latency_sum_ms: AtomicU64::new(0),
            extract_latency_max_ms: AtomicU64::new(0),
            extractions_since_report: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record a capture that aggregated names into the roster
    pub fn record_capture(&self, latency_ms: u64, names_recorded: u64) {
        self.captures_total.fetch_add(1, Ordering::Relaxed);
        self.names_recorded_total.fetch_add(names_recorded, Ordering::Relaxed);
        self.record_extraction_latency(latency_ms);
    }

    /// Record a capture that failed with a service error
    pub fn record_failure(&self, latency_ms: u64) {
        self.captures_failed.fetch_add(1, Ordering::Relaxed);
        self.record_extraction_latency(latency_ms);
    }

    /// Record a capture whose response normalized to no names
    pub fn record_empty(&self, latency_ms: u64) {
        self.captures_empty.fetch_add(1, Ordering::Relaxed);
        self.record_extraction_latency(latency_ms);
    }

    pub fn record_export(&self) {
        self.exports_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_extraction_latency(&self, latency_ms: u64) {
        self.extract_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.extractions_since_report.fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.extract_latency_max_ms, latency_ms);
    }

    /// Snapshot the counters. Interval latency values are swapped to zero so
    /// each report covers only the period since the previous one.
    pub fn report(&self, attendees: usize) -> StatsSummary {
        let extractions = self.extractions_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.extract_latency_sum_ms.swap(0, Ordering::Relaxed);
        let latency_max = self.extract_latency_max_ms.swap(0, Ordering::Relaxed);
        let avg_latency = if extractions > 0 { latency_sum / extractions } else { 0 };

        StatsSummary {
            captures_total: self.captures_total.load(Ordering::Relaxed),
            captures_failed: self.captures_failed.load(Ordering::Relaxed),
            captures_empty: self.captures_empty.load(Ordering::Relaxed),
            names_recorded_total: self.names_recorded_total.load(Ordering::Relaxed),
            exports_total: self.exports_total.load(Ordering::Relaxed),
            avg_extract_latency_ms: avg_latency,
            max_extract_latency_ms: latency_max,
            attendees,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Point-in-time stats snapshot
#[derive(Debug, Clone, Copy)]
pub struct StatsSummary {
    pub captures_total: u64,
    pub captures_failed: u64,
    pub captures_empty: u64,
    pub names_recorded_total: u64,
    pub exports_total: u64,
    /// Average extraction latency since last report (ms)
    pub avg_extract_latency_ms: u64,
    /// Max extraction latency since last report (ms)
    pub max_extract_latency_ms: u64,
    pub attendees: usize,
    pub uptime_secs: u64,
}

impl StatsSummary {
    /// Log the summary as a structured event
    pub fn log(&self) {
        info!(
            captures_total = %self.captures_total,
            captures_failed = %self.captures_failed,
            captures_empty = %self.captures_empty,
            names_recorded_total = %self.names_recorded_total,
            exports_total = %self.exports_total,
            avg_extract_latency_ms = %self.avg_extract_latency_ms,
            max_extract_latency_ms = %self.max_extract_latency_ms,
            attendees = %self.attendees,
            uptime_secs = %self.uptime_secs,
            "stats_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_capture() {
        let stats = Stats::new();
        stats.record_capture(120, 5);
        stats.record_capture(80, 2);

        let summary = stats.report(7);
        assert_eq!(summary.captures_total, 2);
        assert_eq!(summary.names_recorded_total, 7);
        assert_eq!(summary.avg_extract_latency_ms, 100);
        assert_eq!(summary.max_extract_latency_ms, 120);
        assert_eq!(summary.attendees, 7);
    }

    #[test]
    fn test_latency_window_resets_on_report() {
        let stats = Stats::new();
        stats.record_capture(500, 1);
        let first = stats.report(1);
        assert_eq!(first.max_extract_latency_ms, 500);

        // Monotonic counters survive, interval latency does not
        let second = stats.report(1);
        assert_eq!(second.captures_total, 1);
        assert_eq!(second.avg_extract_latency_ms, 0);
        assert_eq!(second.max_extract_latency_ms, 0);
    }

    #[test]
    fn test_failure_and_empty_counters() {
        let stats = Stats::new();
        stats.record_failure(50);
        stats.record_empty(60);
        stats.record_export();

        let summary = stats.report(0);
        assert_eq!(summary.captures_total, 0);
        assert_eq!(summary.captures_failed, 1);
        assert_eq!(summary.captures_empty, 1);
        assert_eq!(summary.exports_total, 1);
    }
}
