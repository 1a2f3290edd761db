// ── Live-update events ──
//
// Everything the core pushes to the publish channel. Serializes as
// `{"event": "<name>", "data": {...}}` so a transport can forward the name
// and payload without knowing the variants.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::detection::{DetectionItem, Details};
use super::sensor::SensorReading;
use crate::throughput::ThroughputSnapshot;

/// Wire shape of one accepted detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPayload {
    /// Epoch seconds.
    pub ts: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: Details,
    pub image_url: String,
    pub thumb_url: String,
}

impl From<&DetectionItem> for DetectionPayload {
    fn from(item: &DetectionItem) -> Self {
        Self {
            ts: item.timestamp,
            kind: item.kind().to_owned(),
            details: item.details().clone(),
            image_url: item.image_url.clone(),
            thumb_url: item.thumb_url.clone(),
        }
    }
}

impl From<&Arc<DetectionItem>> for DetectionPayload {
    fn from(item: &Arc<DetectionItem>) -> Self {
        Self::from(item.as_ref())
    }
}

/// Several detections accepted from one multi-item submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetBatch {
    pub count: usize,
    pub image_url: String,
    pub thumb_url: String,
    pub device_id: Option<String>,
    pub detections: Vec<DetectionPayload>,
}

/// An event pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A single-item submission was accepted.
    RecentDetection(DetectionPayload),
    /// One or more items of a multi-item submission were accepted.
    TargetBatch(TargetBatch),
    /// Periodic throughput snapshot.
    ThroughputUpdate(ThroughputSnapshot),
    /// A sensor reading was ingested.
    SensorUpdate(SensorReading),
}

impl LiveEvent {
    /// Event name as seen by subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RecentDetection(_) => "recent_detection",
            Self::TargetBatch(_) => "target_batch",
            Self::ThroughputUpdate(_) => "throughput_update",
            Self::SensorUpdate(_) => "sensor_update",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::Target;

    #[test]
    fn recent_detection_wire_shape() {
        let item = DetectionItem {
            timestamp: 1000.0,
            target: Target::parse(
                "aruco",
                json!({"id": 17, "confidence": 0.96}).as_object().cloned().unwrap(),
            ),
            image_url: "/img/a.jpg".into(),
            thumb_url: "/img/a.jpg".into(),
        };
        let event = LiveEvent::RecentDetection(DetectionPayload::from(&item));

        assert_eq!(event.name(), "recent_detection");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "recent_detection",
                "data": {
                    "ts": 1000.0,
                    "type": "aruco",
                    "details": {"id": 17, "confidence": 0.96},
                    "image_url": "/img/a.jpg",
                    "thumb_url": "/img/a.jpg"
                }
            })
        );
    }

    #[test]
    fn event_names_match_serde_tags() {
        let event = LiveEvent::TargetBatch(TargetBatch {
            count: 0,
            image_url: String::new(),
            thumb_url: String::new(),
            device_id: None,
            detections: Vec::new(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], json!(event.name()));
        assert_eq!(value["data"]["device_id"], json!(null));
    }
}
