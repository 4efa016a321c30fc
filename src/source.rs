use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::models::location::{GeoPoint, LocationSample};

/// Accuracy reported for the synthetic fallback fix.
const FALLBACK_ACCURACY_M: f64 = 1_000.0;

#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the caller is willing to accept.
    pub maximum_age: Duration,
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    Unavailable,

    #[error("timed out waiting for a fix")]
    Timeout,
}

#[derive(Debug, Clone, Copy)]
pub struct DevicePosition {
    pub point: GeoPoint,
    pub accuracy_m: Option<f64>,
}

/// Device geolocation capability. Implementations honor the timeout and
/// staleness bounds in [`PositionOptions`] themselves.
pub trait PositionProvider: Send + Sync + 'static {
    fn current_position(
        &self,
        opts: PositionOptions,
    ) -> impl Future<Output = Result<DevicePosition, PositionError>> + Send;
}

/// Wraps a [`PositionProvider`] with the fallback discipline the tracking
/// views rely on: a position request never fails, it degrades to a fixed
/// city-center coordinate.
pub struct LocationSource<P> {
    provider: Arc<P>,
    fallback: GeoPoint,
    oneshot_opts: PositionOptions,
    watch_opts: PositionOptions,
    sample_interval: Duration,
    seq: Arc<AtomicU64>,
    watch_task: Option<JoinHandle<()>>,
}

impl<P: PositionProvider> LocationSource<P> {
    pub fn new(
        provider: P,
        fallback: GeoPoint,
        oneshot_opts: PositionOptions,
        watch_opts: PositionOptions,
        sample_interval: Duration,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            fallback,
            oneshot_opts,
            watch_opts,
            sample_interval,
            seq: Arc::new(AtomicU64::new(0)),
            watch_task: None,
        }
    }

    /// One-shot fix. Resolves with the fallback coordinate on any device
    /// failure, so callers always receive a usable sample.
    pub async fn current_location(&self) -> LocationSample {
        match self.provider.current_position(self.oneshot_opts).await {
            Ok(pos) => self.sample_from(pos),
            Err(err) => {
                warn!(error = %err, "one-shot position failed; using fallback");
                self.fallback_sample()
            }
        }
    }

    /// Starts the continuous device watch and returns the stream of samples.
    /// Calling this while a watch is already running restarts it; at most one
    /// device subscription exists per source.
    pub fn start_tracking(&mut self) -> watch::Receiver<Option<LocationSample>> {
        self.stop_tracking();

        let (tx, rx) = watch::channel(None);
        let provider = self.provider.clone();
        let opts = self.watch_opts;
        let interval = self.sample_interval;
        let fallback = self.fallback;
        let seq = self.seq.clone();

        self.watch_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let next = match provider.current_position(opts).await {
                    Ok(pos) => {
                        let mut sample =
                            LocationSample::new(pos.point, seq.fetch_add(1, Ordering::Relaxed));
                        sample.accuracy_m = pos.accuracy_m;
                        Some(sample)
                    }
                    Err(err) => {
                        warn!(error = %err, "device watch sample failed");
                        if tx.borrow().is_none() {
                            // No fix yet: downstream still gets a value.
                            let mut sample = LocationSample::new(
                                fallback,
                                seq.fetch_add(1, Ordering::Relaxed),
                            );
                            sample.accuracy_m = Some(FALLBACK_ACCURACY_M);
                            Some(sample)
                        } else {
                            None
                        }
                    }
                };

                match next {
                    Some(sample) => {
                        if tx.send(Some(sample)).is_err() {
                            break;
                        }
                    }
                    None => {
                        if tx.is_closed() {
                            break;
                        }
                    }
                }
            }

            debug!("device watch released");
        }));

        rx
    }

    /// Releases the device subscription. Safe to call when not tracking.
    pub fn stop_tracking(&mut self) {
        if let Some(task) = self.watch_task.take() {
            task.abort();
            debug!("device watch stopped");
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.watch_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn sample_from(&self, pos: DevicePosition) -> LocationSample {
        let mut sample = LocationSample::new(pos.point, self.seq.fetch_add(1, Ordering::Relaxed));
        sample.accuracy_m = pos.accuracy_m;
        sample
    }

    fn fallback_sample(&self) -> LocationSample {
        let mut sample =
            LocationSample::new(self.fallback, self.seq.fetch_add(1, Ordering::Relaxed));
        sample.accuracy_m = Some(FALLBACK_ACCURACY_M);
        sample
    }
}

impl<P> Drop for LocationSource<P> {
    fn drop(&mut self) {
        // The device watch must not outlive its owner.
        if let Some(task) = self.watch_task.take() {
            task.abort();
        }
    }
}
