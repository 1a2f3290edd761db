// ── Upload envelopes ──
//
// One JSON object per line, naming the upload route and carrying the body a
// device would have posted to it:
//
//   {"route": "targets", "body": {"target_type": "valve", "details": {...}, "image_b64": "..."}}
//   {"route": "sensors", "body": {"co_ppm": 1.2, "temp_c": 21.5}}
//   {"route": "clear-history"}

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use fieldlink_core::{ClearReport, CoreError, IngestReport, SensorRecord, Station, Submission};

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("targets body is missing image_b64")]
    MissingImage,

    #[error("image_b64 is not valid: {0}")]
    Image(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Targets,
    Sensors,
    ClearHistory,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    route: Route,
    #[serde(default)]
    body: Value,
}

/// Body of a `targets` upload.
#[derive(Debug, Deserialize)]
struct TargetsBody {
    target_type: Option<String>,
    details: Option<Value>,
    confidence: Option<Value>,
    ts: Option<Value>,
    device_id: Option<String>,
    image_b64: Option<String>,
}

/// A decoded upload, ready for the station.
#[derive(Debug)]
pub enum Envelope {
    Targets(Submission),
    Sensors(Value),
    ClearHistory,
}

impl Envelope {
    pub fn parse(line: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_str(line)?;
        match raw.route {
            Route::Targets => {
                let body: TargetsBody = serde_json::from_value(raw.body)?;
                Ok(Self::Targets(body.into_submission()?))
            }
            Route::Sensors => Ok(Self::Sensors(raw.body)),
            Route::ClearHistory => Ok(Self::ClearHistory),
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Self::Targets(_) => Route::Targets,
            Self::Sensors(_) => Route::Sensors,
            Self::ClearHistory => Route::ClearHistory,
        }
    }
}

impl TargetsBody {
    fn into_submission(self) -> Result<Submission, EnvelopeError> {
        let image = decode_image(self.image_b64.as_deref().ok_or(EnvelopeError::MissingImage)?)?;
        Ok(Submission {
            target_type: self.target_type,
            details: self.details,
            confidence: self.confidence,
            ts: self.ts,
            device_id: self.device_id,
            image,
        })
    }
}

/// Decode a base64 image, with or without a `data:image/...;base64,` prefix.
pub fn decode_image(encoded: &str) -> Result<Bytes, EnvelopeError> {
    let payload = if encoded.starts_with("data:image/") {
        let (_, data) = encoded
            .split_once(',')
            .ok_or_else(|| EnvelopeError::Image("data URL has no payload".into()))?;
        data
    } else {
        encoded
    };

    STANDARD
        .decode(payload.trim())
        .map(Bytes::from)
        .map_err(|e| EnvelopeError::Image(e.to_string()))
}

// ── Dispatch ─────────────────────────────────────────────────────────

/// What the station did with one envelope.
#[derive(Debug)]
pub enum Outcome {
    Targets(IngestReport),
    Sensors(SensorRecord),
    Cleared(ClearReport),
}

/// Route `envelope` to the station. `byte_count` is metered against the
/// matching upload stream.
pub async fn dispatch(
    station: &Station,
    envelope: Envelope,
    byte_count: u64,
) -> Result<Outcome, CoreError> {
    match envelope {
        Envelope::Targets(submission) => station
            .submit_targets(submission, Some(byte_count))
            .await
            .map(Outcome::Targets),
        Envelope::Sensors(body) => station
            .submit_sensors(&body, Some(byte_count))
            .await
            .map(Outcome::Sensors),
        Envelope::ClearHistory => station.clear_history().await.map(Outcome::Cleared),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn data_url_and_raw_base64_decode_alike() {
        let raw = STANDARD.encode(b"\xff\xd8\xffhello");
        let url = format!("data:image/jpeg;base64,{raw}");
        assert_eq!(decode_image(&raw).unwrap(), decode_image(&url).unwrap());
        assert_eq!(&decode_image(&raw).unwrap()[..3], b"\xff\xd8\xff");
    }

    #[test]
    fn data_url_without_comma_is_rejected() {
        let err = decode_image("data:image/jpeg;base64").unwrap_err();
        assert!(matches!(err, EnvelopeError::Image(_)));
        assert!(decode_image("not base64!").is_err());
    }

    #[test]
    fn targets_envelope_becomes_a_submission() {
        let line = json!({
            "route": "targets",
            "body": {
                "target_type": "valve",
                "details": {"state": "open", "confidence": 0.92},
                "device_id": "rover-1",
                "image_b64": STANDARD.encode(b"img"),
            }
        })
        .to_string();

        let Envelope::Targets(sub) = Envelope::parse(&line).unwrap() else {
            panic!("expected a targets envelope");
        };
        assert_eq!(sub.target_type.as_deref(), Some("valve"));
        assert_eq!(sub.device_id.as_deref(), Some("rover-1"));
        assert_eq!(sub.details.unwrap()["state"], "open");
        assert_eq!(&sub.image[..], b"img");
    }

    #[test]
    fn targets_without_image_are_rejected() {
        let line = r#"{"route": "targets", "body": {"target_type": "valve"}}"#;
        assert!(matches!(
            Envelope::parse(line),
            Err(EnvelopeError::MissingImage)
        ));
    }

    #[test]
    fn routes_parse_in_kebab_case() {
        let clear = Envelope::parse(r#"{"route": "clear-history"}"#).unwrap();
        assert_eq!(clear.route(), Route::ClearHistory);

        let sensors = Envelope::parse(r#"{"route": "sensors", "body": {"co_ppm": 1}}"#).unwrap();
        assert_eq!(sensors.route(), Route::Sensors);

        assert!(Envelope::parse(r#"{"route": "upload"}"#).is_err());
        assert!(Envelope::parse("[]").is_err());
    }
}
