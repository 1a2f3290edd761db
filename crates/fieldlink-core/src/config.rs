// ── Runtime service configuration ──
//
// These types describe how the in-memory services behave. They are fixed at
// construction and never touch disk: the CLI builds a `StationConfig` (via
// fieldlink-config) and hands it in.

use std::time::Duration;

/// Settings for the [`RecentDetectionTracker`](crate::tracker::RecentDetectionTracker).
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// How long accepted detections stay in the buffer.
    pub window: Duration,
    /// Upper bound on buffered detections.
    pub max_items: usize,
    /// Detections below this confidence are dropped.
    pub min_confidence: f64,
    /// Minimum gap before the same object is accepted again.
    pub refresh_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            max_items: 200,
            min_confidence: 0.75,
            refresh_interval: Duration::from_secs(4),
        }
    }
}

/// Settings for the [`ThroughputMeter`](crate::throughput::ThroughputMeter).
#[derive(Debug, Clone, PartialEq)]
pub struct MeterConfig {
    /// Rolling window the byte rate is averaged over.
    pub window: Duration,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(4),
        }
    }
}

/// Configuration for a whole [`Station`](crate::station::Station).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StationConfig {
    pub tracker: TrackerConfig,
    pub meter: MeterConfig,
    /// How often the throughput snapshot is broadcast. `None` uses the
    /// tracker refresh interval.
    pub broadcast_interval: Option<Duration>,
}

impl StationConfig {
    /// Effective throughput broadcast interval.
    pub fn broadcast_interval(&self) -> Duration {
        self.broadcast_interval
            .unwrap_or(self.tracker.refresh_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_constants() {
        let cfg = StationConfig::default();
        assert_eq!(cfg.tracker.window, Duration::from_secs(3600));
        assert_eq!(cfg.tracker.max_items, 200);
        assert!((cfg.tracker.min_confidence - 0.75).abs() < f64::EPSILON);
        assert_eq!(cfg.meter.window, Duration::from_secs(4));
    }

    #[test]
    fn broadcast_interval_follows_refresh_interval() {
        let mut cfg = StationConfig::default();
        cfg.tracker.refresh_interval = Duration::from_millis(2500);
        assert_eq!(cfg.broadcast_interval(), Duration::from_millis(2500));

        cfg.broadcast_interval = Some(Duration::from_secs(1));
        assert_eq!(cfg.broadcast_interval(), Duration::from_secs(1));
    }
}
