// ── Submission normalization ──
//
// Field devices have sent detections in several shapes over time: a bare
// attribute map, a `{target_type, details}` pair, a list of such pairs, or
// any of those serialized into a JSON string. Everything is flattened into
// a list of `DetectionIntent`s here.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::clock::from_epoch_secs;
use crate::model::{Details, UNKNOWN_KIND};

const KIND_KEY: &str = "target_type";
const DETAILS_KEY: &str = "details";
const CONFIDENCE_KEY: &str = "confidence";

/// JSON strings containing JSON strings are unwrapped at most this deep.
const MAX_STRING_NESTING: usize = 4;

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// One detection pulled out of a submission, before it meets the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionIntent {
    pub kind: String,
    pub attributes: Details,
    /// Per-item capture time, if the item carried a parseable one.
    pub ts: Option<DateTime<Utc>>,
}

/// Fields sent next to `details` at the top level of a submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevel<'a> {
    pub kind: Option<&'a str>,
    pub confidence: Option<&'a Value>,
}

/// Flatten a raw `details` payload into detection intents.
///
/// Returns an empty list when nothing usable was found; the caller decides
/// whether that is an error.
pub fn normalize(details: Option<&Value>, top: TopLevel<'_>) -> Vec<DetectionIntent> {
    let mut intents = details
        .map(|value| normalize_value(value, top, 0))
        .unwrap_or_default();

    // Older firmware sends the kind at the top level with no usable details.
    if intents.is_empty() {
        if let Some(kind) = top.kind {
            let mut attributes = Details::new();
            merge_confidence(&mut attributes, top.confidence);
            intents.push(DetectionIntent {
                kind: kind.to_owned(),
                attributes,
                ts: None,
            });
        }
    }

    intents
}

fn normalize_value(value: &Value, top: TopLevel<'_>, depth: usize) -> Vec<DetectionIntent> {
    match value {
        Value::Array(elements) => elements
            .iter()
            .enumerate()
            .filter_map(|(index, element)| {
                let intent = intent_from_element(element);
                if intent.is_none() {
                    debug!(index, "skipping malformed detection element");
                }
                intent
            })
            .collect(),
        Value::Object(map) if map.contains_key(KIND_KEY) && map.contains_key(DETAILS_KEY) => {
            intent_from_element(value).into_iter().collect()
        }
        Value::Object(map) if map.is_empty() => Vec::new(),
        Value::Object(map) => {
            let mut attributes = map.clone();
            merge_confidence(&mut attributes, top.confidence);
            vec![DetectionIntent {
                kind: top.kind.unwrap_or(UNKNOWN_KIND).to_owned(),
                attributes,
                ts: None,
            }]
        }
        Value::String(raw) if depth < MAX_STRING_NESTING => {
            match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => normalize_value(&parsed, top, depth + 1),
                Err(e) => {
                    debug!(error = %e, "details string is not JSON");
                    Vec::new()
                }
            }
        }
        Value::String(_) | Value::Null | Value::Bool(_) | Value::Number(_) => Vec::new(),
    }
}

/// `{"target_type": .., "details": .., "confidence"?: .., "ts"?: ..}`
fn intent_from_element(element: &Value) -> Option<DetectionIntent> {
    let map = element.as_object()?;
    let kind = map.get(KIND_KEY)?.as_str()?;

    let mut attributes = match map.get(DETAILS_KEY) {
        None | Some(Value::Null) => Details::new(),
        Some(Value::Object(details)) => details.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw).ok()? {
            Value::Object(details) => details,
            _ => return None,
        },
        Some(_) => return None,
    };
    merge_confidence(&mut attributes, map.get(CONFIDENCE_KEY));

    let ts = map
        .get("ts")
        .or_else(|| map.get("timestamp"))
        .and_then(parse_timestamp);

    Some(DetectionIntent {
        kind: kind.to_owned(),
        attributes,
        ts,
    })
}

/// Copy a sibling `confidence` into the attribute map unless it already has
/// one.
fn merge_confidence(attributes: &mut Details, confidence: Option<&Value>) {
    if let Some(confidence) = confidence {
        if !confidence.is_null() && !attributes.contains_key(CONFIDENCE_KEY) {
            attributes.insert(CONFIDENCE_KEY.to_owned(), confidence.clone());
        }
    }
}

/// Parse a producer timestamp: RFC 3339, ISO 8601 without offset (taken as
/// UTC), or epoch seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp_str(raw),
        Value::Number(n) => n.as_f64().and_then(from_epoch_secs),
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
