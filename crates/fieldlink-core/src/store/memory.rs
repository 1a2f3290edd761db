// ── In-memory record store ──
//
// Concurrent maps keyed by a monotonically increasing record id. Good for
// the CLI, tests, and any deployment that does not need history to survive
// a restart.

use std::future::ready;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures_core::future::BoxFuture;

use super::RecordStore;
use super::record::{ClearedRecords, DetectionRecord, NewDetection, SensorRecord};
use crate::error::StoreError;
use crate::model::SensorReading;

/// [`RecordStore`] backed by `DashMap`s.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    detections: DashMap<u64, Arc<DetectionRecord>>,
    sensors: DashMap<u64, Arc<SensorRecord>>,
    next_id: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn newest_detections(&self, limit: usize) -> Vec<DetectionRecord> {
        let mut all: Vec<Arc<DetectionRecord>> =
            self.detections.iter().map(|r| Arc::clone(r.value())).collect();
        all.sort_by(|a, b| a.ts.cmp(&b.ts).then(a.id.cmp(&b.id)));
        let skip = all.len().saturating_sub(limit);
        all.into_iter().skip(skip).map(Arc::unwrap_or_clone).collect()
    }

    fn newest_sensors(&self, limit: usize) -> Vec<SensorRecord> {
        let mut all: Vec<Arc<SensorRecord>> =
            self.sensors.iter().map(|r| Arc::clone(r.value())).collect();
        all.sort_by(|a, b| a.reading.ts.cmp(&b.reading.ts).then(a.id.cmp(&b.id)));
        let skip = all.len().saturating_sub(limit);
        all.into_iter().skip(skip).map(Arc::unwrap_or_clone).collect()
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert_detection(
        &self,
        detection: NewDetection,
    ) -> BoxFuture<'_, Result<DetectionRecord, StoreError>> {
        let record = DetectionRecord::from_new(self.allocate_id(), detection);
        self.detections.insert(record.id, Arc::new(record.clone()));
        Box::pin(ready(Ok(record)))
    }

    fn insert_sensor(
        &self,
        reading: SensorReading,
    ) -> BoxFuture<'_, Result<SensorRecord, StoreError>> {
        let record = SensorRecord {
            id: self.allocate_id(),
            reading,
        };
        self.sensors.insert(record.id, Arc::new(record.clone()));
        Box::pin(ready(Ok(record)))
    }

    fn recent_detections(
        &self,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<DetectionRecord>, StoreError>> {
        Box::pin(ready(Ok(self.newest_detections(limit))))
    }

    fn latest_sensor(&self) -> BoxFuture<'_, Result<Option<SensorRecord>, StoreError>> {
        Box::pin(ready(Ok(self.newest_sensors(1).pop())))
    }

    fn sensor_history(
        &self,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<SensorRecord>, StoreError>> {
        Box::pin(ready(Ok(self.newest_sensors(limit))))
    }

    fn clear(&self) -> BoxFuture<'_, Result<ClearedRecords, StoreError>> {
        let cleared = ClearedRecords {
            detections: self.detections.len(),
            sensors: self.sensors.len(),
        };
        self.detections.clear();
        self.sensors.clear();
        Box::pin(ready(Ok(cleared)))
    }
}
