use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::TrackError;
use crate::models::delivery::DeliveryRequest;
use crate::models::location::LocationSample;
use crate::observability::metrics::Metrics;
use crate::publish::TrackEvent;
use crate::state::TrackerStore;

/// Read side of the REST collaborator.
pub trait LocationFeed: Send + Sync + 'static {
    fn driver_location(
        &self,
        driver_id: Uuid,
    ) -> impl Future<Output = Result<Option<LocationSample>, TrackError>> + Send;

    fn delivery(
        &self,
        delivery_id: Uuid,
    ) -> impl Future<Output = Result<DeliveryRequest, TrackError>> + Send;
}

/// Decrements the session gauge however the poll task ends, including abort.
struct SessionGuard {
    metrics: Metrics,
}

impl SessionGuard {
    fn enter(metrics: Metrics) -> Self {
        metrics.active_tracking_sessions.inc();
        Self { metrics }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.metrics.active_tracking_sessions.dec();
    }
}

/// Customer-side pull loop for one delivery: refreshes the request on a
/// fixed tick and, while a driver is en route, feeds their last known
/// location into the store. The loop clears itself when the delivery
/// reaches a terminal status; dropping the handle aborts it immediately.
pub struct DeliveryPoller {
    task: JoinHandle<()>,
    delivery_rx: watch::Receiver<Option<DeliveryRequest>>,
}

impl DeliveryPoller {
    pub fn spawn<F: LocationFeed>(
        feed: Arc<F>,
        store: Arc<TrackerStore>,
        delivery_id: Uuid,
        interval: Duration,
    ) -> Self {
        let (delivery_tx, delivery_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let _session = SessionGuard::enter(store.metrics.clone());
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let delivery = match feed.delivery(delivery_id).await {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        // Superseded by the next tick, never retried inline.
                        warn!(delivery_id = %delivery_id, error = %err, "delivery poll failed");
                        store
                            .metrics
                            .poll_cycles_total
                            .with_label_values(&["error"])
                            .inc();
                        continue;
                    }
                };

                let status = delivery.status;
                let driver = delivery.driver_id;
                let _ = delivery_tx.send(Some(delivery));

                if status.is_terminal() {
                    info!(delivery_id = %delivery_id, ?status, "tracking ended; poll loop cleared");
                    break;
                }

                if let Some(driver_id) = driver {
                    if status.is_active() {
                        match feed.driver_location(driver_id).await {
                            Ok(Some(sample)) => {
                                store.apply(driver_id, sample);
                            }
                            Ok(None) => {
                                // Driver has not shared a fix yet; the view
                                // shows its connecting state.
                            }
                            Err(err) => {
                                warn!(driver_id = %driver_id, error = %err, "driver location poll failed");
                                store
                                    .metrics
                                    .poll_cycles_total
                                    .with_label_values(&["error"])
                                    .inc();
                                continue;
                            }
                        }
                    }
                }

                store
                    .metrics
                    .poll_cycles_total
                    .with_label_values(&["success"])
                    .inc();
            }
        });

        Self { task, delivery_rx }
    }

    /// Latest delivery snapshot observed by the loop.
    pub fn delivery(&self) -> watch::Receiver<Option<DeliveryRequest>> {
        self.delivery_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops polling immediately. Also happens on drop, so navigating away
    /// from a tracking view cannot leak the timer.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for DeliveryPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Push-mode counterpart of the poller: applies `driver-location` events
/// from the real-time channel for one driver.
pub struct PushSubscriber {
    task: JoinHandle<()>,
}

impl PushSubscriber {
    pub fn spawn(
        store: Arc<TrackerStore>,
        events: broadcast::Receiver<TrackEvent>,
        driver_id: Uuid,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut stream = BroadcastStream::new(events);

            while let Some(event) = stream.next().await {
                match event {
                    Ok(TrackEvent::DriverLocation {
                        driver_id: from,
                        sample,
                        ..
                    }) if from == driver_id => {
                        store.apply(from, sample);
                    }
                    Ok(_) => {}
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        // Only the latest sample matters anyway.
                        warn!(skipped, "push subscriber lagged behind the channel");
                    }
                }
            }
        });

        Self { task }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PushSubscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}
