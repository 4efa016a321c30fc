use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TrackError;
use crate::models::delivery::DeliveryStatus;
use crate::models::location::LocationSample;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPing {
    pub driver_id: Uuid,
    pub sample: LocationSample,
}

/// Events carried on the real-time channel, keyed by driver/delivery id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TrackEvent {
    DriverLocation {
        driver_id: Uuid,
        delivery_id: Option<Uuid>,
        sample: LocationSample,
    },
    DriverLocations {
        drivers: Vec<DriverPing>,
    },
    DriverStatusChanged {
        driver_id: Uuid,
        delivery_id: Uuid,
        status: DeliveryStatus,
    },
}

/// Fire-and-forget push transport. A lost event is superseded by the next
/// GPS sample, so there is no acknowledgement and no retry.
pub trait PushChannel: Send + Sync {
    fn emit(&self, event: TrackEvent) -> Result<(), TrackError>;
}

/// REST "set my location" write, used as a rate-limited backstop behind the
/// push channel.
pub trait LocationStore: Send + Sync {
    fn persist_location(
        &self,
        entity: Uuid,
        sample: &LocationSample,
    ) -> impl Future<Output = Result<(), TrackError>> + Send;
}

/// In-process channel backed by a broadcast queue. Stands in for the
/// socket transport in the simulation binary and in tests.
#[derive(Clone)]
pub struct InProcessChannel {
    tx: broadcast::Sender<TrackEvent>,
}

impl InProcessChannel {
    pub fn new(buffer: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackEvent> {
        self.tx.subscribe()
    }
}

impl PushChannel for InProcessChannel {
    fn emit(&self, event: TrackEvent) -> Result<(), TrackError> {
        // Send only fails with no subscribers, which is fine for a broadcast.
        let _ = self.tx.send(event);
        Ok(())
    }
}

/// Driver-side fan-out of location samples: every sample goes to the push
/// channel, and at most one REST persist per `persist_interval` backs it up.
pub struct LocationPublisher<C, S> {
    driver_id: Uuid,
    active_delivery: Option<Uuid>,
    channel: C,
    store: Option<S>,
    persist_interval: Duration,
    last_persist: Option<Instant>,
    metrics: Metrics,
}

impl<C: PushChannel, S: LocationStore> LocationPublisher<C, S> {
    pub fn new(
        driver_id: Uuid,
        channel: C,
        store: Option<S>,
        persist_interval: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            driver_id,
            active_delivery: None,
            channel,
            store,
            persist_interval,
            last_persist: None,
            metrics,
        }
    }

    /// Tags subsequent samples with the delivery currently being fulfilled.
    pub fn set_active_delivery(&mut self, delivery: Option<Uuid>) {
        self.active_delivery = delivery;
    }

    pub async fn publish(&mut self, sample: LocationSample) {
        match self.channel.emit(TrackEvent::DriverLocation {
            driver_id: self.driver_id,
            delivery_id: self.active_delivery,
            sample: sample.clone(),
        }) {
            Ok(()) => {
                self.metrics
                    .locations_published_total
                    .with_label_values(&["push", "success"])
                    .inc();
            }
            Err(err) => {
                warn!(driver_id = %self.driver_id, error = %err, "push publish failed");
                self.metrics
                    .locations_published_total
                    .with_label_values(&["push", "error"])
                    .inc();
            }
        }

        let Some(store) = &self.store else {
            return;
        };

        let due = self
            .last_persist
            .is_none_or(|at| at.elapsed() >= self.persist_interval);
        if !due {
            return;
        }
        self.last_persist = Some(Instant::now());

        match store.persist_location(self.driver_id, &sample).await {
            Ok(()) => {
                debug!(driver_id = %self.driver_id, seq = sample.seq, "location persisted");
                self.metrics
                    .locations_published_total
                    .with_label_values(&["rest", "success"])
                    .inc();
            }
            Err(err) => {
                // Not retried: the next sample supersedes this one.
                warn!(driver_id = %self.driver_id, error = %err, "location persist failed");
                self.metrics
                    .locations_published_total
                    .with_label_values(&["rest", "error"])
                    .inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::models::location::GeoPoint;

    struct RecordingStore {
        persists: Arc<AtomicUsize>,
    }

    impl LocationStore for RecordingStore {
        fn persist_location(
            &self,
            _entity: Uuid,
            _sample: &LocationSample,
        ) -> impl Future<Output = Result<(), TrackError>> + Send {
            self.persists.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }
    }

    #[derive(Clone)]
    struct FailingChannel;

    impl PushChannel for FailingChannel {
        fn emit(&self, _event: TrackEvent) -> Result<(), TrackError> {
            Err(TrackError::Channel("socket gone".to_string()))
        }
    }

    fn sample(seq: u64) -> LocationSample {
        LocationSample::new(
            GeoPoint {
                lat: 33.58,
                lng: -7.60,
            },
            seq,
        )
    }

    #[tokio::test]
    async fn every_sample_reaches_the_push_channel() {
        let channel = InProcessChannel::new(16);
        let mut rx = channel.subscribe();
        let delivery = Uuid::new_v4();

        let mut publisher = LocationPublisher::<_, RecordingStore>::new(
            Uuid::new_v4(),
            channel,
            None,
            Duration::from_secs(30),
            Metrics::new(),
        );
        publisher.set_active_delivery(Some(delivery));

        publisher.publish(sample(0)).await;
        publisher.publish(sample(1)).await;

        for expected_seq in 0..2 {
            match rx.recv().await.unwrap() {
                TrackEvent::DriverLocation {
                    delivery_id,
                    sample,
                    ..
                } => {
                    assert_eq!(delivery_id, Some(delivery));
                    assert_eq!(sample.seq, expected_seq);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn rest_persist_is_rate_limited() {
        let persists = Arc::new(AtomicUsize::new(0));
        let store = RecordingStore {
            persists: persists.clone(),
        };

        let mut publisher = LocationPublisher::new(
            Uuid::new_v4(),
            InProcessChannel::new(16),
            Some(store),
            Duration::from_secs(30),
            Metrics::new(),
        );

        for seq in 0..5 {
            publisher.publish(sample(seq)).await;
        }

        // First sample persists immediately, the rest fall inside the window.
        assert_eq!(persists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn push_failure_is_swallowed_and_counted() {
        let metrics = Metrics::new();
        let mut publisher = LocationPublisher::<_, RecordingStore>::new(
            Uuid::new_v4(),
            FailingChannel,
            None,
            Duration::from_secs(30),
            metrics.clone(),
        );

        publisher.publish(sample(0)).await;

        let errors = metrics
            .locations_published_total
            .with_label_values(&["push", "error"])
            .get();
        assert_eq!(errors, 1);
    }

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let event = TrackEvent::DriverLocation {
            driver_id: Uuid::nil(),
            delivery_id: None,
            sample: sample(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "driver-location");

        let status = TrackEvent::DriverStatusChanged {
            driver_id: Uuid::nil(),
            delivery_id: Uuid::nil(),
            status: DeliveryStatus::Delivering,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["event"], "driver-status-changed");
        assert_eq!(json["status"], "delivering");
    }
}
