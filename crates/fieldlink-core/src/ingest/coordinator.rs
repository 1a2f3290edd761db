// ── Ingest coordinator ──
//
// Drives one submission end to end: normalize, archive the shared image,
// persist every item, run each through the tracker, and publish at most one
// live event. Items of a batch meet the tracker in submission order.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::normalize::{DetectionIntent, TopLevel, normalize, parse_timestamp};
use super::sensor::parse_sensor_payload;
use crate::clock::{Clock, epoch_secs};
use crate::error::CoreError;
use crate::model::{
    DetectionItem, DetectionPayload, LiveEvent, Target, TargetBatch, UNKNOWN_KIND,
};
use crate::publish::{Publisher, publish_logged};
use crate::store::{
    DetectionRecord, ImageStore, NewDetection, RecordStore, SensorRecord, StoredImage,
};
use crate::tracker::{RecentDetectionTracker, Verdict};

/// One detection upload as received from a field device.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Top-level kind tag, used by single-detection producers.
    pub target_type: Option<String>,
    /// Raw `details` field in any of the accepted shapes.
    pub details: Option<Value>,
    /// Top-level confidence, merged into single-detection attributes.
    pub confidence: Option<Value>,
    /// Batch capture time.
    pub ts: Option<Value>,
    pub device_id: Option<String>,
    /// Decoded image shared by every detection in the submission.
    pub image: Bytes,
}

impl Submission {
    pub fn new(image: impl Into<Bytes>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn target_type(mut self, kind: impl Into<String>) -> Self {
        self.target_type = Some(kind.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn confidence(mut self, confidence: Value) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn ts(mut self, ts: Value) -> Self {
        self.ts = Some(ts);
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// What happened to one submission.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Items found after normalization.
    pub submitted: usize,
    /// Items persisted to the record store.
    pub saved: usize,
    /// Items accepted by the tracker.
    pub accepted: usize,
    pub image_url: String,
    pub thumb_url: String,
    pub detections: Vec<DetectionRecord>,
    /// Name of the live event published, if any.
    pub event: Option<&'static str>,
}

/// Orchestrates detection and sensor submissions.
pub struct IngestCoordinator {
    tracker: Arc<RecentDetectionTracker>,
    records: Arc<dyn RecordStore>,
    images: Arc<dyn ImageStore>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

impl IngestCoordinator {
    pub fn new(
        tracker: Arc<RecentDetectionTracker>,
        records: Arc<dyn RecordStore>,
        images: Arc<dyn ImageStore>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tracker,
            records,
            images,
            publisher,
            clock,
        }
    }

    /// Process one detection submission.
    ///
    /// Fails only on bad input, an unusable image, or when no item could be
    /// persisted at all. Partial acceptance by the tracker is success.
    ///
    /// Persistence and the tracker are independent. When every insert fails
    /// the tracker still keeps what it accepted, and the live event has
    /// already been published by the time `CoreError::Storage` is returned.
    pub async fn submit(&self, submission: Submission) -> Result<IngestReport, CoreError> {
        let Submission {
            target_type,
            details,
            confidence,
            ts,
            device_id,
            image,
        } = submission;

        let intents = normalize(
            details.as_ref(),
            TopLevel {
                kind: target_type.as_deref(),
                confidence: confidence.as_ref(),
            },
        );
        if intents.is_empty() {
            return Err(CoreError::EmptySubmission);
        }

        let batch_ts = match ts.as_ref() {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                CoreError::invalid_payload(format!("unparseable timestamp: {raw}"))
            })?),
        };

        let received_at = self.clock.now();
        let server_ts = epoch_secs(received_at);

        let archive_kind = target_type
            .as_deref()
            .or_else(|| intents.first().map(|i| i.kind.as_str()))
            .unwrap_or(UNKNOWN_KIND);
        let stored = self.images.archive(image, archive_kind, received_at).await?;

        let submitted = intents.len();
        let mut detections = Vec::with_capacity(submitted);
        let mut accepted = Vec::new();
        let mut last_store_error = None;

        for intent in intents {
            let DetectionIntent {
                kind,
                attributes,
                ts: item_ts,
            } = intent;

            let new = NewDetection {
                ts: item_ts.or(batch_ts).unwrap_or(received_at),
                target_type: kind.clone(),
                details: attributes.clone(),
                image_url: stored.url.clone(),
                device_id: device_id.clone(),
            };
            match self.records.insert_detection(new).await {
                Ok(record) => detections.push(record),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "failed to persist detection");
                    last_store_error = Some(e);
                }
            }

            let verdict = self
                .tracker
                .assess(Target::parse(&kind, attributes), &stored.url, server_ts);
            debug!(kind = %kind, verdict = verdict.label(), "detection considered");
            if let Verdict::Accepted(item) = verdict {
                accepted.push(item);
            }
        }

        let event = shape_event(submitted, &accepted, &stored, device_id);
        let event_name = event.as_ref().map(LiveEvent::name);
        if let Some(event) = event {
            publish_logged(self.publisher.as_ref(), event);
        }

        info!(
            submitted,
            saved = detections.len(),
            accepted = accepted.len(),
            "detection submission processed"
        );

        if detections.is_empty() {
            if let Some(e) = last_store_error {
                return Err(e.into());
            }
        }

        Ok(IngestReport {
            submitted,
            saved: detections.len(),
            accepted: accepted.len(),
            image_url: stored.url,
            thumb_url: stored.thumb_url,
            detections,
            event: event_name,
        })
    }

    /// Validate, persist and publish one sensor reading.
    pub async fn submit_sensor(&self, payload: &Value) -> Result<SensorRecord, CoreError> {
        let reading = parse_sensor_payload(payload, self.clock.now())?;
        let record = self.records.insert_sensor(reading).await?;
        debug!(id = record.id, source = %record.reading.source, "sensor reading stored");
        publish_logged(
            self.publisher.as_ref(),
            LiveEvent::SensorUpdate(record.reading.clone()),
        );
        Ok(record)
    }
}

/// One item in, one accepted: a single event. Several items in, any
/// accepted: one batch event, so the dashboard redraws once.
fn shape_event(
    submitted: usize,
    accepted: &[Arc<DetectionItem>],
    stored: &StoredImage,
    device_id: Option<String>,
) -> Option<LiveEvent> {
    match (submitted, accepted) {
        (_, []) => None,
        (1, [item]) => Some(LiveEvent::RecentDetection(DetectionPayload::from(item))),
        _ => Some(LiveEvent::TargetBatch(TargetBatch {
            count: accepted.len(),
            image_url: stored.url.clone(),
            thumb_url: stored.thumb_url.clone(),
            device_id,
            detections: accepted.iter().map(DetectionPayload::from).collect(),
        })),
    }
}
