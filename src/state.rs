use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::location::LocationSample;
use crate::observability::metrics::Metrics;

/// An accepted location change for a tracked entity.
#[derive(Debug, Clone)]
pub struct LocationUpdate {
    pub entity: Uuid,
    pub sample: LocationSample,
}

/// Last known location per tracked entity, with last-write-wins conflict
/// resolution. Passed explicitly to publishers/subscribers/views; nothing
/// in the crate reaches for ambient shared state.
pub struct TrackerStore {
    locations: DashMap<Uuid, LocationSample>,
    updates_tx: broadcast::Sender<LocationUpdate>,
    pub metrics: Metrics,
}

impl TrackerStore {
    pub fn new(event_buffer_size: usize, metrics: Metrics) -> Self {
        let (updates_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            locations: DashMap::new(),
            updates_tx,
            metrics,
        }
    }

    /// Applies a sample if it is newer than the one currently held for the
    /// entity. Returns false when the sample is discarded as stale, which
    /// happens when a slow poll resolves after a fresher one already landed.
    pub fn apply(&self, entity: Uuid, sample: LocationSample) -> bool {
        match self.locations.entry(entity) {
            Entry::Occupied(mut current) => {
                if !sample.is_newer_than(current.get()) {
                    debug!(
                        entity = %entity,
                        seq = sample.seq,
                        held_seq = current.get().seq,
                        "discarding stale location sample"
                    );
                    self.metrics.stale_samples_discarded_total.inc();
                    return false;
                }
                current.insert(sample.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(sample.clone());
            }
        }

        let _ = self.updates_tx.send(LocationUpdate { entity, sample });
        true
    }

    pub fn latest(&self, entity: Uuid) -> Option<LocationSample> {
        self.locations.get(&entity).map(|held| held.value().clone())
    }

    /// Drops the entity's location entirely, e.g. when tracking ends.
    pub fn forget(&self, entity: Uuid) {
        self.locations.remove(&entity);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LocationUpdate> {
        self.updates_tx.subscribe()
    }

    pub fn tracked_entities(&self) -> usize {
        self.locations.len()
    }
}
