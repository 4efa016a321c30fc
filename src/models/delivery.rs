use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Accepted,
    Shopping,
    Delivering,
    Completed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Cancelled)
    }

    /// A driver is assigned and moving; the only statuses worth polling a
    /// driver location for.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Accepted | DeliveryStatus::Shopping | DeliveryStatus::Delivering
        )
    }

    pub fn customer_copy(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Looking for a driver...",
            DeliveryStatus::Accepted => "Driver is on the way to the store",
            DeliveryStatus::Shopping => "Driver is shopping for your items",
            DeliveryStatus::Delivering => "Driver is on the way to you",
            DeliveryStatus::Completed => "Delivery completed!",
            DeliveryStatus::Cancelled => "Request was cancelled",
        }
    }
}

/// A coordinate together with its display address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedPoint {
    pub point: GeoPoint,
    pub address: String,
}

/// A delivery request as owned by the backend. Read-only here: status
/// transitions are driven entirely by the external service, the tracking
/// core only reacts to the current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub item: String,
    pub store: String,
    pub status: DeliveryStatus,
    pub pickup: LocatedPoint,
    pub dropoff: LocatedPoint,
    pub driver_id: Option<Uuid>,
}
