//! Address resolution.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use transit_bot_core::{Location, Result, validate_address};

use crate::config::GeocoderConfig;
use crate::error::GeocodeError;

/// Resolves free-form addresses to locations.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Looks up `address`. Returns `Ok(None)` when nothing matches.
    async fn geocode(&self, address: &str) -> Result<Option<Location>, GeocodeError>;
}

/// Geocoder backed by a Nominatim-compatible search endpoint.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

/// One search hit. Nominatim sends coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    display_name: String,
}

impl NominatimGeocoder {
    /// Creates a geocoder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &GeocoderConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Option<Location>, GeocodeError> {
        let address = validate_address(address).map_err(GeocodeError::InvalidAddress)?;

        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GeocodeError::RequestFailed {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::RequestFailed {
                details: format!("status {}", status.as_u16()),
            }
            .into());
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| GeocodeError::MalformedResponse {
                details: e.to_string(),
            })?;

        let Some(place) = places.into_iter().next() else {
            debug!("no geocoding match");
            return Ok(None);
        };

        let lat = parse_coordinate(&place.lat)?;
        let lon = parse_coordinate(&place.lon)?;
        let location = Location::new(lat, lon, place.display_name).map_err(|e| {
            GeocodeError::MalformedResponse {
                details: e.to_string(),
            }
        })?;

        debug!(lat, lon, "geocoded address");
        Ok(Some(location))
    }
}

fn parse_coordinate(raw: &str) -> Result<f64, GeocodeError> {
    let value = raw
        .trim()
        .parse()
        .map_err(|_| GeocodeError::MalformedResponse {
            details: format!("invalid coordinate '{}'", raw),
        })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder_for(mock_server: &MockServer) -> NominatimGeocoder {
        NominatimGeocoder::new(&GeocoderConfig {
            base_url: mock_server.uri(),
            ..GeocoderConfig::default()
        })
        .expect("client builds")
    }

    #[tokio::test]
    async fn resolves_first_match() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Place de la Victoire"))
            .and(query_param("format", "json"))
            .and(header("User-Agent", "bordeaux_transport_bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"lat": "44.8307", "lon": "-0.5729", "display_name": "Place de la Victoire, Bordeaux"}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let location = geocoder_for(&mock_server)
            .geocode("  Place de la Victoire ")
            .await
            .expect("lookup succeeds")
            .expect("match found");

        assert_eq!(location.name, "Place de la Victoire, Bordeaux");
        assert!((location.lat - 44.8307).abs() < 1e-9);
        assert!((location.lon + 0.5729).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_match_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let result = geocoder_for(&mock_server).geocode("Atlantis").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn invalid_address_is_rejected_without_lookup() {
        let mock_server = MockServer::start().await;

        let result = geocoder_for(&mock_server).geocode("   ").await;
        assert!(result.is_err());

        let requests = mock_server.received_requests().await.unwrap_or_default();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn provider_error_status_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        assert!(geocoder_for(&mock_server).geocode("Bordeaux").await.is_err());
    }

    #[test]
    fn coordinate_parsing() {
        assert_eq!(parse_coordinate(" 44.5 ").ok(), Some(44.5));
        assert!(parse_coordinate("north").is_err());
    }
}
