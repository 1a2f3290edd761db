// ── Recent-detection tracker ──
//
// Keeps a bounded, time-windowed buffer of accepted detections and decides
// whether a new detection is worth showing. A detector that sees the same
// static object every frame is collapsed to one card per refresh interval.
//
// All state sits behind a single mutex. Every critical section is a short,
// synchronous read-evict-mutate sequence; nothing awaits while it is held.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::config::TrackerConfig;
use crate::model::{DetectionItem, Details, Target};

/// Outcome of offering a detection to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Accepted and appended to the buffer.
    Accepted(Arc<DetectionItem>),
    /// A live-feed heartbeat, not a detection.
    Heartbeat,
    /// Below the confidence threshold.
    LowConfidence { confidence: f64 },
    /// Same object as the last accepted detection, seen again too soon.
    Suppressed { since_last: f64 },
}

impl Verdict {
    pub fn accepted(self) -> Option<Arc<DetectionItem>> {
        match self {
            Self::Accepted(item) => Some(item),
            Self::Heartbeat | Self::LowConfidence { .. } | Self::Suppressed { .. } => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted(_) => "accepted",
            Self::Heartbeat => "heartbeat",
            Self::LowConfidence { .. } => "low_confidence",
            Self::Suppressed { .. } => "suppressed",
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    /// Arrival order. Not necessarily sorted by timestamp.
    buffer: VecDeque<Arc<DetectionItem>>,
    last_accepted: Option<Arc<DetectionItem>>,
    last_accepted_at: f64,
}

/// De-duplicating buffer of recently accepted detections.
///
/// Shared by handle (`Arc`) between request handlers and read endpoints.
#[derive(Debug)]
pub struct RecentDetectionTracker {
    config: TrackerConfig,
    state: Mutex<TrackerState>,
}

impl RecentDetectionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Offer a detection. Returns the new item if it was accepted.
    ///
    /// `server_ts` is supplied by the caller so that every item of one
    /// submission can share a timestamp.
    pub fn consider(
        &self,
        kind: &str,
        details: Details,
        image_url: &str,
        server_ts: f64,
    ) -> Option<Arc<DetectionItem>> {
        self.assess(Target::parse(kind, details), image_url, server_ts)
            .accepted()
    }

    /// Like [`consider`](Self::consider), but reports why a detection was
    /// dropped.
    pub fn assess(&self, target: Target, image_url: &str, server_ts: f64) -> Verdict {
        if target.is_heartbeat() {
            return Verdict::Heartbeat;
        }

        let confidence = target.confidence();
        if confidence < self.config.min_confidence {
            return Verdict::LowConfidence { confidence };
        }

        let mut state = self.lock();

        let cutoff = server_ts - self.config.window.as_secs_f64();
        state.buffer.retain(|item| item.timestamp >= cutoff);

        if let Some(last) = state.last_accepted.as_ref() {
            let since_last = server_ts - state.last_accepted_at;
            if last.target.same_object(&target)
                && since_last < self.config.refresh_interval.as_secs_f64()
            {
                trace!(kind = target.kind(), since_last, "suppressing repeat detection");
                return Verdict::Suppressed { since_last };
            }
        }

        let item = Arc::new(DetectionItem {
            timestamp: server_ts,
            target,
            image_url: image_url.to_owned(),
            thumb_url: image_url.to_owned(),
        });

        state.buffer.push_back(Arc::clone(&item));
        while state.buffer.len() > self.config.max_items {
            state.buffer.pop_front();
        }
        state.last_accepted = Some(Arc::clone(&item));
        state.last_accepted_at = server_ts;

        Verdict::Accepted(item)
    }

    /// The newest `limit` buffered detections, oldest first.
    ///
    /// Stale entries are only purged by the next `consider`; a read never
    /// mutates the buffer.
    pub fn list(&self, limit: usize) -> Vec<Arc<DetectionItem>> {
        let state = self.lock();
        let skip = state.buffer.len().saturating_sub(limit);
        state.buffer.iter().skip(skip).cloned().collect()
    }

    /// The most recently accepted detection, if any.
    pub fn last_accepted(&self) -> Option<Arc<DetectionItem>> {
        self.lock().last_accepted.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    /// Forget everything: buffer, last accepted item and its timestamp.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.buffer.clear();
        state.last_accepted = None;
        state.last_accepted_at = 0.0;
    }

    // A panic can only happen between whole statements above, so the state
    // is still consistent after poisoning.
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
