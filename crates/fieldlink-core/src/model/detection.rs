// ── Detection domain types ──
//
// Producers send a kind tag plus a loosely-typed attribute map. The three
// kinds the tracker understands get typed identity fields pulled out of the
// map; everything else rides along untouched so it can be forwarded as-is.

use serde_json::Value;

/// Producer-defined attribute map, forwarded verbatim to subscribers.
pub type Details = serde_json::Map<String, Value>;

/// Kind tag reserved for live-feed heartbeats. Never a real detection.
pub const HEARTBEAT_KIND: &str = "livedata";

/// Kind used when a payload carries attributes but no kind tag.
pub const UNKNOWN_KIND: &str = "unknown";

// ── Attribute coercion ───────────────────────────────────────────────

/// An attribute read out of a [`Details`] map.
///
/// `Missing` means the key was absent; `Invalid` means it was present but
/// could not be coerced to the wanted type (including explicit `null`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    Missing,
    Value(T),
    Invalid,
}

impl<T: Copy> Reading<T> {
    /// Resolve to a concrete value, substituting `default` when missing.
    /// Invalid readings resolve to `None`.
    pub fn or_default(self, default: T) -> Option<T> {
        match self {
            Self::Missing => Some(default),
            Self::Value(v) => Some(v),
            Self::Invalid => None,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing | Self::Invalid => None,
        }
    }
}

/// Read a float attribute. Numeric strings are accepted.
pub fn read_f64(details: &Details, key: &str) -> Reading<f64> {
    match details.get(key) {
        None => Reading::Missing,
        Some(value) => coerce_f64(value).map_or(Reading::Invalid, Reading::Value),
    }
}

/// Read an integer attribute. Floats are truncated toward zero; strings must
/// hold an integer literal.
pub fn read_i64(details: &Details, key: &str) -> Reading<i64> {
    match details.get(key) {
        None => Reading::Missing,
        Some(value) => coerce_i64(value).map_or(Reading::Invalid, Reading::Value),
    }
}

pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::as_conversions
)]
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            let truncated = f.trunc();
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
            (f.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64)
                .then_some(truncated as i64)
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ── Target ───────────────────────────────────────────────────────────

/// Valve detection. Identity is the reported `state`, compared exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ValveTarget {
    pub state: Option<Value>,
    pub details: Details,
}

/// Gauge detection. Identity is the needle reading in bar.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeTarget {
    pub reading_bar: Reading<f64>,
    pub details: Details,
}

/// ArUco marker detection. Identity is the marker id.
#[derive(Debug, Clone, PartialEq)]
pub struct ArucoTarget {
    pub id: Reading<i64>,
    pub details: Details,
}

/// A detection's kind together with its attributes.
///
/// Known kinds carry typed identity fields; open-ended kinds keep only the
/// raw map. Every variant keeps the original map for forwarding.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Valve(ValveTarget),
    Gauge(GaugeTarget),
    Aruco(ArucoTarget),
    /// Live-feed frame with nothing detected.
    Heartbeat(Details),
    Other { kind: String, details: Details },
}

/// Gauge readings closer than this are the same needle position.
pub const GAUGE_TOLERANCE_BAR: f64 = 0.1;

impl Target {
    /// Build a target from a producer-supplied kind tag and attribute map.
    pub fn parse(kind: &str, details: Details) -> Self {
        match kind {
            "valve" => Self::Valve(ValveTarget {
                state: details.get("state").cloned(),
                details,
            }),
            "gauge" => Self::Gauge(GaugeTarget {
                reading_bar: read_f64(&details, "reading_bar"),
                details,
            }),
            "aruco" => Self::Aruco(ArucoTarget {
                id: read_i64(&details, "id"),
                details,
            }),
            HEARTBEAT_KIND => Self::Heartbeat(details),
            other => Self::Other {
                kind: other.to_owned(),
                details,
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Valve(_) => "valve",
            Self::Gauge(_) => "gauge",
            Self::Aruco(_) => "aruco",
            Self::Heartbeat(_) => HEARTBEAT_KIND,
            Self::Other { kind, .. } => kind,
        }
    }

    pub fn details(&self) -> &Details {
        match self {
            Self::Valve(t) => &t.details,
            Self::Gauge(t) => &t.details,
            Self::Aruco(t) => &t.details,
            Self::Heartbeat(details) | Self::Other { details, .. } => details,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat(_))
    }

    /// Producer confidence in `[0, 1]`. Absent, non-numeric and non-finite
    /// values count as `0.0`.
    pub fn confidence(&self) -> f64 {
        read_f64(self.details(), "confidence")
            .value()
            .filter(|c| c.is_finite())
            .unwrap_or(0.0)
    }

    /// Whether `next` reports the same physical object as `self`.
    ///
    /// `self` is the previously accepted detection. Missing identity fields
    /// default to `-1` on this side and `-2` on the other, so two absent
    /// readings never match each other. Unknown kinds are never the same
    /// object.
    pub fn same_object(&self, next: &Target) -> bool {
        match (self, next) {
            (Self::Valve(last), Self::Valve(new)) => last.state == new.state,
            (Self::Gauge(last), Self::Gauge(new)) => match (
                last.reading_bar.or_default(-1.0),
                new.reading_bar.or_default(-2.0),
            ) {
                // Plain f64 difference, no epsilon: 1.0 vs 1.1 differs by
                // slightly more than 0.1 and counts as a new reading.
                (Some(a), Some(b)) => (a - b).abs() <= GAUGE_TOLERANCE_BAR,
                _ => false,
            },
            (Self::Aruco(last), Self::Aruco(new)) => {
                match (last.id.or_default(-1), new.id.or_default(-2)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// One accepted detection, as held by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionItem {
    /// Server-assigned acceptance time, epoch seconds.
    pub timestamp: f64,
    pub target: Target,
    pub image_url: String,
    pub thumb_url: String,
}

impl DetectionItem {
    pub fn kind(&self) -> &str {
        self.target.kind()
    }

    pub fn details(&self) -> &Details {
        self.target.details()
    }
}
