use crate::models::driver::EtaEstimate;
use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Heuristic ratio between road distance and the great-circle distance.
const ROAD_FACTOR: f64 = 1.5;
/// Assumed average urban driving speed.
const AVERAGE_SPEED_KMH: f64 = 20.0;
/// Fixed handling buffer added to every estimate.
const HANDLING_BUFFER_MIN: u32 = 2;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().atan2((1.0 - haversine).sqrt());

    EARTH_RADIUS_KM * central_angle
}

/// Heuristic ETA from a great-circle distance. Deliberately never consults
/// a routing service: road factor, average speed and a fixed buffer, floored
/// at one minute.
pub fn estimate_minutes(distance_km: f64) -> u32 {
    let road_km = distance_km.max(0.0) * ROAD_FACTOR;
    let driving_min = (road_km / AVERAGE_SPEED_KMH * 60.0).round() as u32;

    (driving_min + HANDLING_BUFFER_MIN).max(1)
}

pub fn eta_between(from: &GeoPoint, to: &GeoPoint) -> EtaEstimate {
    EtaEstimate {
        minutes: estimate_minutes(haversine_km(from, to)),
    }
}
