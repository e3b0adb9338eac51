//! Reverse geocoding and free-text place search against Nominatim.

use std::future::Future;

use reqwest::Client;
use serde::Deserialize;
use shared::{Address, Coordinate, Place};

use crate::error::PlannerError;
use crate::http::{check_status, transport, trim_base};
use crate::search::PlaceSearch;

const REVERSE: &str = "reverse geocode";
const SEARCH: &str = "place search";

pub trait Geocoder: Send + Sync + 'static {
    /// Structured address for a coordinate, `None` when nothing is known.
    fn reverse(
        &self,
        coord: Coordinate,
    ) -> impl Future<Output = Result<Option<Address>, PlannerError>> + Send;
}

/// Human-readable address, skipping whatever fields are missing.
pub fn address_label(address: &Address) -> Option<String> {
    let street = join_present(&[address.house_number.as_deref(), address.road.as_deref()], " ");
    let locality = address
        .city
        .as_deref()
        .or(address.town.as_deref())
        .or(address.village.as_deref())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string);
    let region = join_present(&[address.state.as_deref(), address.postcode.as_deref()], " ");

    let parts: Vec<String> = [street, locality, region].into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn join_present(parts: &[Option<&str>], separator: &str) -> Option<String> {
    let present: Vec<&str> = parts
        .iter()
        .flatten()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();
    if present.is_empty() {
        None
    } else {
        Some(present.join(separator))
    }
}

#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<PlaceFeature>,
}

#[derive(Debug, Deserialize)]
struct PlaceFeature {
    geometry: PointGeometry,
    #[serde(default)]
    properties: PlaceProperties,
}

#[derive(Debug, Deserialize)]
struct PointGeometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceProperties {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<Address>,
}

impl NominatimClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

impl Geocoder for NominatimClient {
    async fn reverse(&self, coord: Coordinate) -> Result<Option<Address>, PlannerError> {
        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
            ])
            .send()
            .await
            .map_err(transport(REVERSE))?;
        let response = check_status(REVERSE, response)?;
        let payload: ReverseResponse = response
            .json()
            .await
            .map_err(|err| PlannerError::malformed(REVERSE, err.to_string()))?;
        Ok(payload.address)
    }
}

impl PlaceSearch for NominatimClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, PlannerError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("format", "geojson".to_string()),
                ("addressdetails", "1".to_string()),
                ("q", query.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(transport(SEARCH))?;
        let response = check_status(SEARCH, response)?;
        let payload: FeatureCollection = response
            .json()
            .await
            .map_err(|err| PlannerError::malformed(SEARCH, err.to_string()))?;
        Ok(places_from_features(payload))
    }
}

fn places_from_features(payload: FeatureCollection) -> Vec<Place> {
    payload
        .features
        .into_iter()
        .filter_map(|feature| {
            let [lon, lat, ..] = feature.geometry.coordinates.as_slice() else {
                tracing::debug!("skipping place without coordinates");
                return None;
            };
            let coordinate = Coordinate::new(*lat, *lon);
            let address = feature.properties.address.unwrap_or_default();
            let name = feature
                .properties
                .name
                .filter(|name| !name.trim().is_empty())
                .or(feature.properties.display_name)
                .or_else(|| address_label(&address))
                .unwrap_or_else(|| crate::format::format_coordinate(coordinate));
            Some(Place {
                name,
                coordinate,
                address,
            })
        })
        .collect()
}
