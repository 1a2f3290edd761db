//! Detection tracking, throughput metering and ingest orchestration for a
//! fieldlink ground station.
//!
//! Field devices upload sensor readings and vision detections; this crate
//! decides what is worth showing live and pushes it to subscribers:
//!
//! - **[`RecentDetectionTracker`]** keeps a bounded, time-windowed buffer of
//!   accepted detections. It drops heartbeats and low-confidence results, and
//!   collapses repeated sightings of the same object into one card per
//!   refresh interval.
//!
//! - **[`ThroughputMeter`]** reports a rolling kbit/s rate for each upload
//!   stream (`AQSA` sensors, `TAIP` detections).
//!
//! - **[`IngestCoordinator`]** flattens the submission shapes devices send,
//!   persists every item, drives the tracker, and publishes one
//!   [`LiveEvent`] per submission at most.
//!
//! - **[`Station`]** is the composition root. It owns the services above,
//!   wires in the [`RecordStore`], [`ImageStore`] and [`Publisher`]
//!   collaborators, and runs the periodic `throughput_update` broadcast.
//!
//! Nothing here touches the network or the filesystem directly. Storage and
//! transport are supplied by the embedding binary.

pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod publish;
pub mod station;
pub mod store;
pub mod throughput;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MeterConfig, StationConfig, TrackerConfig};
pub use error::{CoreError, ImageError, PublishError, StoreError};
pub use ingest::{IngestCoordinator, IngestReport, Submission};
pub use publish::{BroadcastPublisher, EVENT_CHANNEL_SIZE, Publisher};
pub use station::{ClearReport, Collaborators, SENSOR_HISTORY_MAX, Station};
pub use store::{
    ClearedRecords, DetectionRecord, ImageStore, MemoryImageStore, MemoryRecordStore,
    NewDetection, RecordStore, SensorRecord, StoredImage,
};
pub use throughput::{StreamName, ThroughputMeter, ThroughputSnapshot};
pub use tracker::{RecentDetectionTracker, Verdict};

pub use model::{
    DetectionItem, DetectionPayload, Details, LiveEvent, SensorReading, Target, TargetBatch,
};
