use std::time::{Duration, Instant};
use tracing::info;

/// Application-level counters for AIS ingest and bridge-text output
/// (not to be confused with the per-vessel tracking state).
pub struct AppMetrics {
    /// Number of decoded AIS records received from the stream
    pub ais_records: u64,
    /// Number of position reports applied to the registry
    pub position_reports: u64,
    /// Number of static-data reports applied
    pub static_reports: u64,
    /// Number of position reports dropped by per-MMSI coalescing
    pub coalesced_records: u64,
    /// Number of bridge text changes emitted
    pub bridge_texts_emitted: u64,
    /// Number of vessels removed by the cleanup sweep
    pub vessels_removed: u64,
    /// Vessels currently tracked (gauge, set at log time)
    pub vessels_tracked: usize,
}

impl AppMetrics {
    /// Create a new AppMetrics instance with all counters at zero
    pub fn new() -> Self {
        Self {
            ais_records: 0,
            position_reports: 0,
            static_reports: 0,
            coalesced_records: 0,
            bridge_texts_emitted: 0,
            vessels_removed: 0,
            vessels_tracked: 0,
        }
    }

    /// Reset all counters to zero
    pub fn reset(&mut self) {
        self.ais_records = 0;
        self.position_reports = 0;
        self.static_reports = 0;
        self.coalesced_records = 0;
        self.bridge_texts_emitted = 0;
        self.vessels_removed = 0;
        // Note: vessels_tracked is a gauge, not reset
    }

    /// Log current metrics to the info log
    pub fn log(&self) {
        info!(
            "[Metrics] records: {}, positions: {}, statics: {}, coalesced: {}, texts emitted: {}, removed: {}, tracked: {}",
            self.ais_records,
            self.position_reports,
            self.static_reports,
            self.coalesced_records,
            self.bridge_texts_emitted,
            self.vessels_removed,
            self.vessels_tracked
        );
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Manages periodic logging of application metrics
pub struct MetricsLogger {
    last_log: Instant,
    log_interval: Duration,
}

impl MetricsLogger {
    /// Create a new MetricsLogger with the specified logging interval
    pub fn new(log_interval: Duration) -> Self {
        Self {
            last_log: Instant::now(),
            log_interval,
        }
    }

    /// Check if it's time to log metrics, and if so, log them and reset
    /// Returns true if metrics were logged
    pub fn check_and_log(&mut self, metrics: &mut AppMetrics) -> bool {
        if self.last_log.elapsed() >= self.log_interval {
            metrics.log();
            metrics.reset();
            self.last_log = Instant::now();
            true
        } else {
            false
        }
    }
}
