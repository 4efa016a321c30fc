mod api;
mod config;
mod error;
mod geo;
mod map;
mod models;
mod observability;
mod publish;
mod source;
mod state;
mod subscribe;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::map::view::{self, ViewPhase};
use crate::map::{LogSurface, MapReconciler};
use crate::models::delivery::{DeliveryRequest, DeliveryStatus, LocatedPoint};
use crate::models::location::GeoPoint;
use crate::observability::metrics::Metrics;
use crate::publish::{InProcessChannel, LocationPublisher};
use crate::source::{DevicePosition, LocationSource, PositionError, PositionOptions, PositionProvider};
use crate::state::TrackerStore;
use crate::subscribe::PushSubscriber;

/// Scripted GPS that walks the driver from the store toward the dropoff,
/// standing in for a real device. Mirrors the in-app tracking test panel.
struct SimulatedGps {
    start: GeoPoint,
    end: GeoPoint,
    steps: usize,
    step: AtomicUsize,
}

impl PositionProvider for SimulatedGps {
    fn current_position(
        &self,
        _opts: PositionOptions,
    ) -> impl Future<Output = Result<DevicePosition, PositionError>> + Send {
        let n = self.step.fetch_add(1, Ordering::SeqCst).min(self.steps);
        let t = n as f64 / self.steps as f64;
        let point = GeoPoint {
            lat: self.start.lat + (self.end.lat - self.start.lat) * t,
            lng: self.start.lng + (self.end.lng - self.start.lng) * t,
        };

        async move {
            Ok(DevicePosition {
                point,
                accuracy_m: Some(8.0),
            })
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), error::TrackError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let metrics = Metrics::new();
    let store = Arc::new(TrackerStore::new(config.event_buffer_size, metrics.clone()));
    let channel = InProcessChannel::new(config.event_buffer_size);

    let driver_id = Uuid::new_v4();
    let delivery = DeliveryRequest {
        id: Uuid::new_v4(),
        item: "Groceries".to_string(),
        store: "Marjane".to_string(),
        status: DeliveryStatus::Delivering,
        pickup: LocatedPoint {
            point: GeoPoint {
                lat: 33.58,
                lng: -7.60,
            },
            address: "Marjane, Casablanca".to_string(),
        },
        dropoff: LocatedPoint {
            point: GeoPoint {
                lat: 33.57,
                lng: -7.59,
            },
            address: "Boulevard d'Anfa, Casablanca".to_string(),
        },
        driver_id: Some(driver_id),
    };

    tracing::info!(
        delivery_id = %delivery.id,
        driver_id = %driver_id,
        "simulated tracking run started"
    );

    let mut gps_source = LocationSource::new(
        SimulatedGps {
            start: delivery.pickup.point,
            end: delivery.dropoff.point,
            steps: 20,
            step: AtomicUsize::new(0),
        },
        config.fallback(),
        config.oneshot_options(),
        config.watch_options(),
        Duration::from_millis(500),
    );

    // Driver side: device watch feeding the push channel.
    let mut samples = gps_source.start_tracking();
    let mut publisher = LocationPublisher::<_, api::ApiClient>::new(
        driver_id,
        channel.clone(),
        None,
        config.persist_interval(),
        metrics.clone(),
    );
    publisher.set_active_delivery(Some(delivery.id));

    let driver_task = tokio::spawn(async move {
        while samples.changed().await.is_ok() {
            let sample = samples.borrow_and_update().clone();
            if let Some(sample) = sample {
                publisher.publish(sample).await;
            }
        }
    });

    // Customer side: push subscription into the shared store.
    let _subscriber = PushSubscriber::spawn(store.clone(), channel.subscribe(), driver_id);

    let mut updates = store.subscribe();
    let mut reconciler = MapReconciler::new();
    let mut surface = LogSurface::new();
    let delivery_label = delivery.id.to_string();

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Ok(update) = update else { break };

                let snap = view::snapshot(&delivery, None, Some(update.sample));
                let (reference, driver) = snap.marker_inputs();
                if let Err(err) = reconciler.reconcile(&mut surface, reference, driver) {
                    tracing::warn!(error = %err, "map degraded; showing status text only");
                }

                match snap.phase {
                    ViewPhase::Live { eta } => {
                        metrics
                            .eta_minutes
                            .with_label_values(&[&delivery_label])
                            .set(eta.minutes as f64);
                        tracing::info!(
                            eta_min = eta.minutes,
                            driver = %update.entity,
                            status = snap.status_line,
                            "tracking update"
                        );
                        if eta.minutes <= 2 {
                            tracing::info!("driver has arrived; stopping simulation");
                            break;
                        }
                    }
                    phase => tracing::info!(?phase, status = snap.status_line, "tracking update"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    gps_source.stop_tracking();
    driver_task.abort();

    match metrics.encode() {
        Ok(report) => tracing::debug!(%report, "final metrics"),
        Err(err) => tracing::warn!(error = %err, "failed to encode metrics"),
    }

    Ok(())
}
