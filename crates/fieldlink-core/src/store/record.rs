use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::epoch_secs;
use crate::model::{DetectionPayload, Details, SensorReading};

/// A detection about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub ts: DateTime<Utc>,
    pub target_type: String,
    pub details: Details,
    pub image_url: String,
    pub device_id: Option<String>,
}

/// A persisted detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: u64,
    pub ts: DateTime<Utc>,
    pub target_type: String,
    pub details: Details,
    pub image_url: String,
    pub device_id: Option<String>,
}

impl DetectionRecord {
    pub fn from_new(id: u64, new: NewDetection) -> Self {
        Self {
            id,
            ts: new.ts,
            target_type: new.target_type,
            details: new.details,
            image_url: new.image_url,
            device_id: new.device_id,
        }
    }

    /// Render in the same shape the tracker's items are published in.
    pub fn to_payload(&self) -> DetectionPayload {
        DetectionPayload {
            ts: epoch_secs(self.ts),
            kind: self.target_type.clone(),
            details: self.details.clone(),
            image_url: self.image_url.clone(),
            thumb_url: self.image_url.clone(),
        }
    }
}

/// A persisted sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: u64,
    #[serde(flatten)]
    pub reading: SensorReading,
}

/// Row counts removed by [`RecordStore::clear`](super::RecordStore::clear).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearedRecords {
    pub detections: usize,
    pub sensors: usize,
}
