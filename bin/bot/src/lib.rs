//! Transit bot: resolves user addresses, remembers one location per user and
//! answers with nearby transit departures.
//!
//! The chat platform is reached through a small JSON webhook (see
//! [`routes`]); everything behind it goes through [`handler::Bot`].

pub mod config;
pub mod error;
pub mod geocode;
pub mod handler;
pub mod reply;
pub mod routes;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::BotConfig;
pub use error::{GeocodeError, StartupError, StoreError};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use handler::{Bot, Command, Rejection, Update, validate_request};
pub use reply::{Button, ButtonAction, Reply};
pub use store::{InMemoryLocationStore, LocationStore, PgLocationStore};
