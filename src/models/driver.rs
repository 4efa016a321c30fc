use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::LocationSample;

/// Driver summary as returned by the proximity endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub rating: f64,
    pub location: Option<LocationSample>,
}

/// A driver annotated with the great-circle distance from a query center.
/// The distance is computed client-side, never trusted from the wire.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyDriver {
    pub driver: Driver,
    pub distance_km: f64,
}

/// Derived on every driver location change, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtaEstimate {
    pub minutes: u32,
}
