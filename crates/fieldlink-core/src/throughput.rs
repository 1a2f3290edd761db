// ── Rolling throughput meter ──
//
// Per-stream byte counts over a short sliding window, reported in kbit/s.
// Used for the "link health" gauge on the dashboard.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::clock::Clock;
use crate::config::MeterConfig;

/// A metered ingest stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum StreamName {
    /// Air-quality sensor uploads.
    #[strum(serialize = "AQSA")]
    Aqsa,
    /// Target-detection uploads.
    #[strum(serialize = "TAIP")]
    Taip,
}

impl StreamName {
    fn slot(self) -> usize {
        match self {
            Self::Aqsa => 0,
            Self::Taip => 1,
        }
    }
}

/// Point-in-time rates for every stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSnapshot {
    pub window_sec: f64,
    pub aqsa_kbps: f64,
    pub taip_kbps: f64,
    /// Epoch seconds when the snapshot was taken.
    pub ts: f64,
}

type Samples = VecDeque<(f64, u64)>;

/// Sliding-window byte-rate accumulator.
pub struct ThroughputMeter {
    window_secs: f64,
    clock: Arc<dyn Clock>,
    // One lock for all streams so a snapshot is consistent.
    streams: Mutex<[Samples; 2]>,
}

impl std::fmt::Debug for ThroughputMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThroughputMeter")
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

impl ThroughputMeter {
    pub fn new(config: &MeterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            window_secs: config.window.as_secs_f64(),
            clock,
            streams: Mutex::new([VecDeque::new(), VecDeque::new()]),
        }
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Record `bytes` against a stream named on the wire. Unknown stream
    /// names and absent counts are ignored.
    pub fn add(&self, stream: &str, bytes: Option<u64>) {
        let (Ok(stream), Some(bytes)) = (stream.parse::<StreamName>(), bytes) else {
            return;
        };
        self.record(stream, bytes);
    }

    /// Record `bytes` against a known stream.
    pub fn record(&self, stream: StreamName, bytes: u64) {
        let now = self.clock.epoch_secs();
        let cutoff = now - self.window_secs;
        let mut streams = self.lock();
        let samples = &mut streams[stream.slot()];
        samples.push_back((now, bytes));
        evict(samples, cutoff);
    }

    /// Current rate for a stream in kbit/s, rounded to two decimals.
    pub fn rate_kbps(&self, stream: StreamName) -> f64 {
        let cutoff = self.clock.epoch_secs() - self.window_secs;
        let mut streams = self.lock();
        self.rate_locked(&mut streams[stream.slot()], cutoff)
    }

    pub fn snapshot(&self) -> ThroughputSnapshot {
        let ts = self.clock.epoch_secs();
        let cutoff = ts - self.window_secs;
        let mut streams = self.lock();
        let mut rates = [0.0; 2];
        for stream in StreamName::iter() {
            rates[stream.slot()] = self.rate_locked(&mut streams[stream.slot()], cutoff);
        }
        ThroughputSnapshot {
            window_sec: self.window_secs,
            aqsa_kbps: rates[StreamName::Aqsa.slot()],
            taip_kbps: rates[StreamName::Taip.slot()],
            ts,
        }
    }

    /// Drop every sample on every stream.
    pub fn reset(&self) {
        for samples in self.lock().iter_mut() {
            samples.clear();
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn rate_locked(&self, samples: &mut Samples, cutoff: f64) -> f64 {
        evict(samples, cutoff);
        if samples.is_empty() || self.window_secs <= 0.0 {
            return 0.0;
        }
        let total: u64 = samples.iter().map(|(_, bytes)| bytes).sum();
        let kbps = (total as f64 / self.window_secs) * 8.0 / 1000.0;
        (kbps * 100.0).round() / 100.0
    }

    fn lock(&self) -> MutexGuard<'_, [Samples; 2]> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Samples are appended with a monotonic-ish clock, so stale ones sit at the
// front.
fn evict(samples: &mut Samples, cutoff: f64) {
    while samples.front().is_some_and(|(ts, _)| *ts < cutoff) {
        samples.pop_front();
    }
}
