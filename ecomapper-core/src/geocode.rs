//! Free-text location search. Uses Nominatim (OpenStreetMap), no API key required.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt::Debug;
use thiserror::Error;

use crate::model::Coordinate;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("ecomapper/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Location query is empty")]
    EmptyQuery,
    #[error("Invalid geocoder URL: {0}")]
    InvalidUrl(String),
    #[error("Geocoding request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Geocoder returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Geocoder returned an unusable coordinate: {0}")]
    Parse(String),
}

/// Resolves a free-text place name to a single coordinate.
#[async_trait]
pub trait LocationSearch: Send + Sync + Debug {
    /// `Ok(None)` means nothing matched.
    async fn search(&self, query: &str) -> Result<Option<Coordinate>, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NominatimSearch {
    base_url: String,
    http: Client,
}

impl NominatimSearch {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GeocodeError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { base_url: base_url.into(), http })
    }

    fn search_url(&self) -> Result<Url, GeocodeError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GeocodeError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| GeocodeError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("search");
        Ok(url)
    }
}

#[async_trait]
impl LocationSearch for NominatimSearch {
    async fn search(&self, query: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }

        let response = self
            .http
            .get(self.search_url()?)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status()));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let Some(place) = places.into_iter().next() else {
            tracing::debug!(query, "no geocoding results");
            return Ok(None);
        };

        let latitude = parse_degrees(&place.lat)?;
        let longitude = parse_degrees(&place.lon)?;

        tracing::info!(
            query,
            place = place.display_name.as_deref().unwrap_or("?"),
            latitude,
            longitude,
            "resolved location"
        );
        Ok(Some(Coordinate::new(latitude, longitude)))
    }
}

fn parse_degrees(raw: &str) -> Result<f64, GeocodeError> {
    raw.trim().parse().map_err(|_| GeocodeError::Parse(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_query_is_rejected_without_network() {
        let search = NominatimSearch::new("http://127.0.0.1:9").unwrap();
        let err = search.search("   ").await.unwrap_err();
        assert!(matches!(err, GeocodeError::EmptyQuery));
    }

    #[test]
    fn search_url_appends_resource() {
        let search = NominatimSearch::new("https://example.org/nominatim").unwrap();
        assert_eq!(search.search_url().unwrap().as_str(), "https://example.org/nominatim/search");
    }

    #[test]
    fn degrees_must_be_numeric() {
        assert_eq!(parse_degrees(" 51.5 ").unwrap(), 51.5);
        assert!(matches!(parse_degrees("north"), Err(GeocodeError::Parse(_))));
    }
}
