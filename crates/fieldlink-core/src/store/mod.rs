// ── Persistence collaborators ──
//
// The core never owns a database or a filesystem. It talks to these two
// object-safe traits; the binary (or an embedding service) supplies the
// implementations.

mod image;
mod memory;
mod record;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::future::BoxFuture;

use crate::error::{ImageError, StoreError};
use crate::model::SensorReading;

pub use image::{MemoryImageStore, StoredImage, archive_file_name};
pub use memory::MemoryRecordStore;
pub use record::{ClearedRecords, DetectionRecord, NewDetection, SensorRecord};

/// Durable record of every submission, accepted by the tracker or not.
pub trait RecordStore: Send + Sync {
    fn insert_detection(
        &self,
        detection: NewDetection,
    ) -> BoxFuture<'_, Result<DetectionRecord, StoreError>>;

    fn insert_sensor(
        &self,
        reading: SensorReading,
    ) -> BoxFuture<'_, Result<SensorRecord, StoreError>>;

    /// The newest `limit` detection records, oldest first.
    fn recent_detections(
        &self,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<DetectionRecord>, StoreError>>;

    fn latest_sensor(&self) -> BoxFuture<'_, Result<Option<SensorRecord>, StoreError>>;

    /// The newest `limit` sensor records, oldest first.
    fn sensor_history(&self, limit: usize)
    -> BoxFuture<'_, Result<Vec<SensorRecord>, StoreError>>;

    /// Delete every record.
    fn clear(&self) -> BoxFuture<'_, Result<ClearedRecords, StoreError>>;
}

/// Archive for the image attached to each detection submission.
pub trait ImageStore: Send + Sync {
    /// Store `image` as the latest frame plus an archive copy named after
    /// `kind` and `at`.
    fn archive<'a>(
        &'a self,
        image: Bytes,
        kind: &'a str,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<StoredImage, ImageError>>;

    /// Remove every archived image and the latest frame. Returns how many
    /// files were removed.
    fn clear(&self) -> BoxFuture<'_, Result<usize, ImageError>>;
}
