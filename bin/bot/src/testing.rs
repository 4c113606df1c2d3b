//! Test fixtures shared by the handler and route tests.

use async_trait::async_trait;
use std::sync::Arc;
use transit_bot_access::{DEFAULT_ROTATION_HOURS, RateLimitConfig, RateLimiter, SessionGuard};
use transit_bot_core::{Location, Result};
use transit_bot_transit::{FetcherConfig, ResilientFetcher};
use wiremock::MockServer;

use crate::error::GeocodeError;
use crate::geocode::Geocoder;
use crate::handler::Bot;
use crate::store::InMemoryLocationStore;

/// Geocoder that knows a single place.
///
/// `"unreachable"` fails as if the provider were down; anything else other
/// than the known address has no match.
pub(crate) struct StaticGeocoder {
    address: &'static str,
    location: Location,
}

impl StaticGeocoder {
    pub(crate) fn bordeaux() -> Self {
        Self {
            address: "Place de la Victoire",
            location: Location {
                lat: 44.8307,
                lon: -0.5729,
                name: "Place de la Victoire, Bordeaux".to_string(),
            },
        }
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Location>, GeocodeError> {
        if address == "unreachable" {
            return Err(GeocodeError::RequestFailed {
                details: "connection refused".to_string(),
            }
            .into());
        }
        Ok((address == self.address).then(|| self.location.clone()))
    }
}

/// A fetcher pointed at `mock_server`, with a fast retry policy.
pub(crate) fn fetcher_for(mock_server: &MockServer, limits: RateLimitConfig) -> ResilientFetcher {
    let config = FetcherConfig::new(format!("{}/departures", mock_server.uri()), "test-key")
        .with_retry_delay(std::time::Duration::from_millis(10));
    ResilientFetcher::new(config, RateLimiter::new(limits)).expect("client builds")
}

/// A fetcher for tests that never reach the transit API.
pub(crate) fn unreachable_fetcher() -> ResilientFetcher {
    let config = FetcherConfig::new("http://127.0.0.1:1/departures", "test-key");
    ResilientFetcher::new(config, RateLimiter::new(RateLimitConfig::default()))
        .expect("client builds")
}

/// A bot with an in-memory store and the static geocoder.
pub(crate) fn bot_with(user_limits: RateLimitConfig, fetcher: ResilientFetcher) -> Bot {
    let guard = SessionGuard::new(
        RateLimiter::new(user_limits),
        chrono::Duration::hours(DEFAULT_ROTATION_HOURS),
    );
    Bot::new(
        guard,
        fetcher,
        Arc::new(StaticGeocoder::bordeaux()),
        Arc::new(InMemoryLocationStore::new()),
    )
}
