// ── Core error types ──
//
// User-facing errors from fieldlink-core. Collaborator failures (record
// store, image store, publish channel) have their own small error types;
// the `From` impls below translate them into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input validation ─────────────────────────────────────────────
    #[error("No detections found in submission")]
    EmptySubmission,

    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    // ── Storage ──────────────────────────────────────────────────────
    #[error("Record store failure: {message}")]
    Storage { message: String },

    // ── Administrative ───────────────────────────────────────────────
    #[error("History only partially cleared (failed: {})", failed.join(", "))]
    PartialClear {
        /// Stages that completed before the failure.
        cleared: Vec<String>,
        /// Stages that failed, with their reasons.
        failed: Vec<String>,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Station background tasks are already running")]
    AlreadyStarted,
}

impl CoreError {
    /// Whether the failure was caused by the submitted data rather than the
    /// service. Callers map these to a "bad request" response.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptySubmission | Self::InvalidPayload { .. } | Self::InvalidImage { .. }
        )
    }

    pub(crate) fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }
}

// ── Collaborator errors ──────────────────────────────────────────────

/// Failure reported by a [`RecordStore`](crate::store::RecordStore).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by an [`ImageStore`](crate::store::ImageStore).
#[derive(Debug, Error)]
pub enum ImageError {
    /// The bytes are not an acceptable image. A client error.
    #[error("{0}")]
    Rejected(String),

    /// The image could not be written.
    #[error("image storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a [`Publisher`](crate::publish::Publisher).
#[derive(Debug, Error)]
pub enum PublishError {
    /// Nobody is listening. Expected when no dashboard is connected.
    #[error("no live subscribers")]
    NoSubscribers,

    #[error("publish channel unavailable: {0}")]
    Unavailable(String),
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Storage {
            message: err.message,
        }
    }
}

impl From<ImageError> for CoreError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Rejected(reason) => CoreError::InvalidImage { reason },
            ImageError::Io(e) => CoreError::Storage {
                message: format!("image archive: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_flagged() {
        assert!(CoreError::EmptySubmission.is_client_error());
        assert!(CoreError::invalid_payload("bad").is_client_error());
        assert!(
            CoreError::from(ImageError::Rejected("too small".into())).is_client_error()
        );
        assert!(!CoreError::AlreadyStarted.is_client_error());
    }

    #[test]
    fn image_io_failure_is_a_storage_error() {
        let err = CoreError::from(ImageError::Io(std::io::Error::other("disk full")));
        assert!(matches!(err, CoreError::Storage { .. }));
        assert!(!err.is_client_error());
    }

    #[test]
    fn partial_clear_lists_failures() {
        let err = CoreError::PartialClear {
            cleared: vec!["records".into()],
            failed: vec!["images: permission denied".into()],
        };
        assert_eq!(
            err.to_string(),
            "History only partially cleared (failed: images: permission denied)"
        );
    }
}
