// ── Submission ingest ──
//
// Turns raw device uploads into tracker calls, persisted records and live
// events.

mod coordinator;
mod normalize;
mod sensor;

pub use coordinator::{IngestCoordinator, IngestReport, Submission};
pub use normalize::{DetectionIntent, TopLevel, normalize, parse_timestamp};
pub use sensor::{DEFAULT_SOURCE, parse_sensor_payload};
