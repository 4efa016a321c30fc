use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrackError;
use crate::geo;
use crate::models::delivery::DeliveryRequest;
use crate::models::driver::{Driver, NearbyDriver};
use crate::models::location::{GeoPoint, LocationSample};
use crate::publish::LocationStore;
use crate::subscribe::LocationFeed;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the delivery backend. The backend owns all business logic;
/// this only reads tracking state and writes last-known locations.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

#[derive(Deserialize)]
struct LocationResponse {
    location: Option<LocationSample>,
}

#[derive(Serialize)]
struct PersistLocationBody<'a> {
    location: GeoPoint,
    address: Option<&'a str>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self, TrackError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| TrackError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.bearer_token.is_empty() {
            req
        } else {
            req.bearer_auth(&self.bearer_token)
        }
    }

    pub async fn fetch_driver_location(
        &self,
        driver_id: Uuid,
    ) -> Result<Option<LocationSample>, TrackError> {
        let response = self
            .authed(self.http.get(self.url(&format!("users/{driver_id}/location"))))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: LocationResponse = response.error_for_status()?.json().await?;
        Ok(body.location)
    }

    pub async fn fetch_delivery(&self, delivery_id: Uuid) -> Result<DeliveryRequest, TrackError> {
        let response = self
            .authed(self.http.get(self.url(&format!("requests/{delivery_id}"))))
            .send()
            .await?;

        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn push_location(
        &self,
        entity: Uuid,
        sample: &LocationSample,
    ) -> Result<(), TrackError> {
        let body = PersistLocationBody {
            location: sample.point,
            address: sample.address.as_deref(),
        };

        self.authed(self.http.patch(self.url(&format!("users/{entity}/location"))))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Driver discovery around a point. Distance is annotated client-side
    /// from the great-circle engine, never trusted from the wire.
    pub async fn nearby_drivers(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<NearbyDriver>, TrackError> {
        let response = self
            .authed(self.http.get(self.url("drivers/nearby")))
            .query(&[
                ("lat", center.lat.to_string()),
                ("lng", center.lng.to_string()),
                ("radius_km", radius_km.to_string()),
            ])
            .send()
            .await?;

        let drivers: Vec<Driver> = response.error_for_status()?.json().await?;
        Ok(rank_by_distance(center, drivers, radius_km))
    }
}

/// Annotates drivers with their distance from `center`, drops those outside
/// the radius or without a known location, closest first.
pub fn rank_by_distance(
    center: GeoPoint,
    drivers: Vec<Driver>,
    radius_km: f64,
) -> Vec<NearbyDriver> {
    let mut ranked: Vec<NearbyDriver> = drivers
        .into_iter()
        .filter_map(|driver| {
            let location = driver.location.as_ref()?;
            let distance_km = geo::haversine_km(&center, &location.point);
            if distance_km > radius_km {
                return None;
            }
            Some(NearbyDriver {
                driver,
                distance_km,
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}

impl LocationFeed for ApiClient {
    fn driver_location(
        &self,
        driver_id: Uuid,
    ) -> impl Future<Output = Result<Option<LocationSample>, TrackError>> + Send {
        self.fetch_driver_location(driver_id)
    }

    fn delivery(
        &self,
        delivery_id: Uuid,
    ) -> impl Future<Output = Result<DeliveryRequest, TrackError>> + Send {
        self.fetch_delivery(delivery_id)
    }
}

impl LocationStore for ApiClient {
    fn persist_location(
        &self,
        entity: Uuid,
        sample: &LocationSample,
    ) -> impl Future<Output = Result<(), TrackError>> + Send {
        self.push_location(entity, sample)
    }
}
