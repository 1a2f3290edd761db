// ── Live-update publish channel ──
//
// The core hands finished events to a `Publisher` and never waits on
// delivery. Failures are logged and swallowed: persisted records and tracker
// state stay committed either way.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::error::PublishError;
use crate::model::LiveEvent;

/// Default buffer for the broadcast channel. Slow subscribers that fall
/// further behind than this skip ahead.
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Outbound sink for [`LiveEvent`]s.
pub trait Publisher: Send + Sync {
    /// Deliver `event`. Returns how many subscribers received it.
    fn publish(&self, event: LiveEvent) -> Result<usize, PublishError>;
}

/// Publish and log any failure. Returns whether the event was delivered.
pub(crate) fn publish_logged(publisher: &dyn Publisher, event: LiveEvent) -> bool {
    let name = event.name();
    match publisher.publish(event) {
        Ok(receivers) => {
            debug!(event = name, receivers, "event published");
            true
        }
        Err(PublishError::NoSubscribers) => {
            debug!(event = name, "no live subscribers, event dropped");
            false
        }
        Err(e) => {
            warn!(event = name, error = %e, "failed to publish event");
            false
        }
    }
}

/// In-process fan-out over a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Arc<LiveEvent>>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LiveEvent>> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`. Lagged receivers yield an error item and
    /// continue from the oldest retained event.
    pub fn subscribe_stream(&self) -> BroadcastStream<Arc<LiveEvent>> {
        BroadcastStream::new(self.tx.subscribe())
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_SIZE)
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, event: LiveEvent) -> Result<usize, PublishError> {
        self.tx
            .send(Arc::new(event))
            .map_err(|_| PublishError::NoSubscribers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::throughput::ThroughputSnapshot;

    fn snapshot() -> LiveEvent {
        LiveEvent::ThroughputUpdate(ThroughputSnapshot {
            window_sec: 4.0,
            aqsa_kbps: 0.0,
            taip_kbps: 0.0,
            ts: 1.0,
        })
    }

    #[test]
    fn publish_without_subscribers_reports_no_subscribers() {
        let publisher = BroadcastPublisher::default();
        assert!(matches!(
            publisher.publish(snapshot()),
            Err(PublishError::NoSubscribers)
        ));
        assert!(!publish_logged(&publisher, snapshot()));
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let publisher = BroadcastPublisher::default();
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.publish(snapshot()).unwrap(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "throughput_update");
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let publisher = BroadcastPublisher::new(2);
        let mut rx = publisher.subscribe();
        for _ in 0..5 {
            publisher.publish(snapshot()).unwrap();
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert!(rx.recv().await.is_ok());
    }
}
