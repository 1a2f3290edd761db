// ── Domain model ──
//
// Canonical types shared by the tracker, the ingest path and the publish
// channel.

pub mod detection;
pub mod event;
pub mod sensor;

pub use detection::{
    ArucoTarget, DetectionItem, Details, GaugeTarget, HEARTBEAT_KIND, Reading, Target,
    UNKNOWN_KIND, ValveTarget,
};
pub use event::{DetectionPayload, LiveEvent, TargetBatch};
pub use sensor::{SENSOR_FIELDS, SensorReading};
