// ── Station ──
//
// Composition root for a ground station. Owns the tracker, the meter and the
// collaborators, routes submissions, and runs the periodic throughput
// broadcast.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StationConfig;
use crate::error::CoreError;
use crate::ingest::{IngestCoordinator, IngestReport, Submission};
use crate::model::{DetectionPayload, LiveEvent};
use crate::publish::{BroadcastPublisher, Publisher, publish_logged};
use crate::store::{
    ClearedRecords, ImageStore, MemoryImageStore, MemoryRecordStore, RecordStore, SensorRecord,
};
use crate::throughput::{StreamName, ThroughputMeter, ThroughputSnapshot};
use crate::tracker::RecentDetectionTracker;

/// Upper bound for [`Station::sensor_history`].
pub const SENSOR_HISTORY_MAX: usize = 500;

// tokio intervals cannot tick at zero.
const MIN_BROADCAST_INTERVAL: Duration = Duration::from_millis(10);

// ── Collaborators ────────────────────────────────────────────────

/// External services a [`Station`] depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub records: Arc<dyn RecordStore>,
    pub images: Arc<dyn ImageStore>,
    pub publisher: Arc<dyn Publisher>,
    pub clock: Arc<dyn Clock>,
    broadcast: Option<BroadcastPublisher>,
}

impl Collaborators {
    pub fn new(
        records: Arc<dyn RecordStore>,
        images: Arc<dyn ImageStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            records,
            images,
            publisher,
            clock: Arc::new(SystemClock),
            broadcast: None,
        }
    }

    /// In-memory stores and an in-process broadcast channel.
    pub fn in_memory() -> Self {
        let broadcast = BroadcastPublisher::default();
        Self {
            records: Arc::new(MemoryRecordStore::new()),
            images: Arc::new(MemoryImageStore::default()),
            publisher: Arc::new(broadcast.clone()),
            clock: Arc::new(SystemClock),
            broadcast: Some(broadcast),
        }
    }

    #[must_use]
    pub fn with_records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = records;
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: Arc<dyn ImageStore>) -> Self {
        self.images = images;
        self
    }

    /// Publish through `publisher`; [`Station::subscribe`] will hand out
    /// receivers for it.
    #[must_use]
    pub fn with_broadcast(mut self, publisher: BroadcastPublisher) -> Self {
        self.publisher = Arc::new(publisher.clone());
        self.broadcast = Some(publisher);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

// ── ClearReport ──────────────────────────────────────────────────

/// Result of a successful [`Station::clear_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub records: ClearedRecords,
    pub images: usize,
}

// ── Station ──────────────────────────────────────────────────────

/// The running ground station.
///
/// Cheaply cloneable via `Arc<StationInner>`.
#[derive(Clone)]
pub struct Station {
    inner: Arc<StationInner>,
}

struct StationInner {
    config: StationConfig,
    tracker: Arc<RecentDetectionTracker>,
    meter: Arc<ThroughputMeter>,
    coordinator: IngestCoordinator,
    records: Arc<dyn RecordStore>,
    images: Arc<dyn ImageStore>,
    publisher: Arc<dyn Publisher>,
    broadcast: Option<BroadcastPublisher>,
    cancel: CancellationToken,
    /// Child token for the running task set, replaced on every start.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Station {
    /// Build a station. Does not start background tasks; call
    /// [`start()`](Self::start).
    pub fn new(config: StationConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            records,
            images,
            publisher,
            clock,
            broadcast,
        } = collaborators;

        let tracker = Arc::new(RecentDetectionTracker::new(config.tracker.clone()));
        let meter = Arc::new(ThroughputMeter::new(&config.meter, Arc::clone(&clock)));
        let coordinator = IngestCoordinator::new(
            Arc::clone(&tracker),
            Arc::clone(&records),
            Arc::clone(&images),
            Arc::clone(&publisher),
            clock,
        );
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(StationInner {
                config,
                tracker,
                meter,
                coordinator,
                records,
                images,
                publisher,
                broadcast,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &Arc<RecentDetectionTracker> {
        &self.inner.tracker
    }

    pub fn meter(&self) -> &Arc<ThroughputMeter> {
        &self.inner.meter
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the periodic throughput broadcaster.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return Err(CoreError::AlreadyStarted);
        }

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let period = self.inner.config.broadcast_interval().max(MIN_BROADCAST_INTERVAL);
        handles.push(tokio::spawn(throughput_task(
            Arc::clone(&self.inner.meter),
            Arc::clone(&self.inner.publisher),
            period,
            child,
        )));

        info!(interval_ms = period.as_millis(), "station started");
        Ok(())
    }

    /// Stop background tasks and wait for them to finish. The station can be
    /// started again afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        debug!("station stopped");
    }

    // ── Ingest ───────────────────────────────────────────────────

    /// Meter and process a detection upload of `byte_count` bytes.
    pub async fn submit_targets(
        &self,
        submission: Submission,
        byte_count: Option<u64>,
    ) -> Result<IngestReport, CoreError> {
        if let Some(bytes) = byte_count {
            self.inner.meter.record(StreamName::Taip, bytes);
        }
        self.inner.coordinator.submit(submission).await
    }

    /// Meter and process a sensor upload of `byte_count` bytes.
    pub async fn submit_sensors(
        &self,
        payload: &Value,
        byte_count: Option<u64>,
    ) -> Result<SensorRecord, CoreError> {
        if let Some(bytes) = byte_count {
            self.inner.meter.record(StreamName::Aqsa, bytes);
        }
        self.inner.coordinator.submit_sensor(payload).await
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Recently accepted detections, oldest first.
    ///
    /// When the tracker holds nothing (after a restart, say) the newest
    /// persisted records stand in.
    pub async fn recent_detections(
        &self,
        limit: usize,
    ) -> Result<Vec<DetectionPayload>, CoreError> {
        let live = self.inner.tracker.list(limit);
        if !live.is_empty() {
            return Ok(live.iter().map(DetectionPayload::from).collect());
        }

        let stored = self.inner.records.recent_detections(limit).await?;
        debug!(count = stored.len(), "recent detections served from record store");
        Ok(stored.iter().map(|r| r.to_payload()).collect())
    }

    pub fn throughput(&self) -> ThroughputSnapshot {
        self.inner.meter.snapshot()
    }

    pub async fn latest_sensor(&self) -> Result<Option<SensorRecord>, CoreError> {
        Ok(self.inner.records.latest_sensor().await?)
    }

    /// Newest sensor readings, oldest first. `limit` is capped at
    /// [`SENSOR_HISTORY_MAX`].
    pub async fn sensor_history(&self, limit: usize) -> Result<Vec<SensorRecord>, CoreError> {
        Ok(self
            .inner
            .records
            .sensor_history(limit.min(SENSOR_HISTORY_MAX))
            .await?)
    }

    // ── Administration ───────────────────────────────────────────

    /// Wipe persisted records, archived images, the detection buffer and
    /// the throughput samples.
    ///
    /// The in-memory state is always cleared. If a collaborator fails the
    /// error names what was and was not cleared.
    pub async fn clear_history(&self) -> Result<ClearReport, CoreError> {
        let mut cleared = Vec::new();
        let mut failed = Vec::new();

        let records = match self.inner.records.clear().await {
            Ok(counts) => {
                cleared.push("records".to_owned());
                counts
            }
            Err(e) => {
                failed.push(format!("records: {e}"));
                ClearedRecords::default()
            }
        };

        let images = match self.inner.images.clear().await {
            Ok(removed) => {
                cleared.push("images".to_owned());
                removed
            }
            Err(e) => {
                failed.push(format!("images: {e}"));
                0
            }
        };

        self.inner.tracker.clear();
        self.inner.meter.reset();
        cleared.push("recent detections".to_owned());
        cleared.push("throughput".to_owned());

        if !failed.is_empty() {
            warn!(failed = ?failed, "history only partially cleared");
            return Err(CoreError::PartialClear { cleared, failed });
        }

        info!(
            detections = records.detections,
            sensors = records.sensors,
            images,
            "history cleared"
        );
        Ok(ClearReport { records, images })
    }

    // ── Live updates ─────────────────────────────────────────────

    /// Receive live events. `None` unless the station publishes through a
    /// [`BroadcastPublisher`].
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Arc<LiveEvent>>> {
        self.inner.broadcast.as_ref().map(BroadcastPublisher::subscribe)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Publish a throughput snapshot every `period` until cancelled.
async fn throughput_task(
    meter: Arc<ThroughputMeter>,
    publisher: Arc<dyn Publisher>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                publish_logged(
                    publisher.as_ref(),
                    LiveEvent::ThroughputUpdate(meter.snapshot()),
                );
            }
        }
    }
}
