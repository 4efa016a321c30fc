use crate::geo;
use crate::models::delivery::{DeliveryRequest, DeliveryStatus};
use crate::models::driver::EtaEstimate;
use crate::models::location::{GeoPoint, LocationSample};

/// What the tracking view should present, derived purely from the delivery
/// status and the latest driver sample. The core never drives status
/// transitions, it only reacts to the backend's current value.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewPhase {
    /// No driver assigned yet.
    Searching,
    /// Driver en route but no location fix received; shown instead of an
    /// empty map.
    Connecting,
    Live { eta: EtaEstimate },
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub phase: ViewPhase,
    pub status_line: &'static str,
    /// Fixed reference point: the customer's home when set, otherwise the
    /// delivery address.
    pub reference: GeoPoint,
    pub driver: Option<LocationSample>,
}

impl ViewSnapshot {
    /// Marker inputs for the reconciler. The driver marker only exists in
    /// the live phase.
    pub fn marker_inputs(&self) -> (Option<GeoPoint>, Option<GeoPoint>) {
        let driver = match self.phase {
            ViewPhase::Live { .. } => self.driver.as_ref().map(|sample| sample.point),
            _ => None,
        };
        (Some(self.reference), driver)
    }
}

pub fn snapshot(
    request: &DeliveryRequest,
    home: Option<GeoPoint>,
    driver: Option<LocationSample>,
) -> ViewSnapshot {
    let reference = home
        .filter(GeoPoint::is_meaningful)
        .unwrap_or(request.dropoff.point);

    let phase = match request.status {
        DeliveryStatus::Completed => ViewPhase::Completed,
        DeliveryStatus::Cancelled => ViewPhase::Cancelled,
        DeliveryStatus::Pending => ViewPhase::Searching,
        DeliveryStatus::Accepted | DeliveryStatus::Shopping | DeliveryStatus::Delivering => {
            match &driver {
                Some(sample) => ViewPhase::Live {
                    eta: geo::eta_between(&sample.point, &reference),
                },
                None => ViewPhase::Connecting,
            }
        }
    };

    ViewSnapshot {
        phase,
        status_line: request.status.customer_copy(),
        reference,
        driver,
    }
}
