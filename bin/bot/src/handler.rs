//! Command handling.
//!
//! Every inbound update is validated, logged and admitted through the
//! [`SessionGuard`] before any command runs. Updates that fail validation are
//! dropped without a reply; updates denied by the rate limit get the
//! rate-limit message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use transit_bot_access::SessionGuard;
use transit_bot_core::{UserId, ValidationError, validate_address};
use transit_bot_transit::ResilientFetcher;

use crate::geocode::Geocoder;
use crate::reply::{self, ButtonAction, Reply};
use crate::store::LocationStore;

/// Maximum accepted message length, in characters.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Substrings that cause a message to be dropped.
pub const INJECTION_MARKERS: [&str; 5] = [";", "--", "/*", "*/", "xp_"];

/// One user action delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Platform user id of the sender.
    pub user_id: UserId,
    /// Message text, for typed commands and addresses.
    #[serde(default)]
    pub text: Option<String>,
    /// Button pressed, for callback updates.
    #[serde(default)]
    pub callback: Option<ButtonAction>,
}

impl Update {
    /// Creates a text message update.
    #[must_use]
    pub fn message(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: Some(text.into()),
            callback: None,
        }
    }

    /// Creates a button press update.
    #[must_use]
    pub fn button(user_id: UserId, action: ButtonAction) -> Self {
        Self {
            user_id,
            text: None,
            callback: Some(action),
        }
    }
}

/// Why an update was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Neither text nor a button press.
    Empty,
    /// Text longer than [`MAX_MESSAGE_LEN`].
    TooLong { len: usize },
    /// Text contains one of [`INJECTION_MARKERS`].
    InjectionMarker(&'static str),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "update carries no action"),
            Self::TooLong { len } => {
                write!(f, "message is {} characters, max {}", len, MAX_MESSAGE_LEN)
            }
            Self::InjectionMarker(marker) => write!(f, "message contains '{}'", marker),
        }
    }
}

/// Checks an update before it is logged or admitted.
pub fn validate_request(update: &Update) -> Result<(), Rejection> {
    let Some(text) = update.text.as_deref() else {
        return match update.callback {
            Some(_) => Ok(()),
            None => Err(Rejection::Empty),
        };
    };

    let len = text.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(Rejection::TooLong { len });
    }

    if let Some(marker) = INJECTION_MARKERS.iter().find(|m| text.contains(**m)) {
        return Err(Rejection::InjectionMarker(*marker));
    }

    Ok(())
}

/// A parsed user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`
    Start,
    /// `/set_location <address>`, or a plain message holding an address.
    SetLocation(String),
    /// The set/change location buttons: ask for an address.
    PromptAddress,
    /// `/get_transport`
    GetTransport,
    /// Any other slash command.
    Unknown(String),
}

impl Command {
    /// Parses an update. Button presses take precedence over text.
    #[must_use]
    pub fn parse(update: &Update) -> Self {
        match update.callback {
            Some(ButtonAction::SetLocation | ButtonAction::ChangeLocation) => {
                return Self::PromptAddress;
            }
            Some(ButtonAction::GetTransport) => return Self::GetTransport,
            None => {}
        }

        let text = update.text.as_deref().unwrap_or_default().trim();
        let Some(command) = text.strip_prefix('/') else {
            return Self::SetLocation(text.to_string());
        };

        let (name, args) = command
            .split_once(char::is_whitespace)
            .unwrap_or((command, ""));
        // Group chats address commands as `/cmd@botname`.
        let name = name.split('@').next().unwrap_or_default();

        match name {
            "start" => Self::Start,
            "set_location" => Self::SetLocation(args.trim().to_string()),
            "get_transport" => Self::GetTransport,
            other => Self::Unknown(other.to_string()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::SetLocation(_) => "set_location",
            Self::PromptAddress => "prompt_address",
            Self::GetTransport => "get_transport",
            Self::Unknown(name) => name,
        }
    }
}

/// The bot: admission, collaborators and command dispatch.
pub struct Bot {
    guard: SessionGuard,
    fetcher: ResilientFetcher,
    geocoder: Arc<dyn Geocoder>,
    store: Arc<dyn LocationStore>,
}

impl Bot {
    /// Assembles a bot from its collaborators.
    #[must_use]
    pub fn new(
        guard: SessionGuard,
        fetcher: ResilientFetcher,
        geocoder: Arc<dyn Geocoder>,
        store: Arc<dyn LocationStore>,
    ) -> Self {
        Self {
            guard,
            fetcher,
            geocoder,
            store,
        }
    }

    /// Returns the session guard.
    #[must_use]
    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// Handles one update. Returns `None` when the update is dropped.
    #[instrument(skip_all, fields(user_id = %update.user_id))]
    pub async fn handle(&self, update: &Update) -> Option<Reply> {
        if let Err(rejection) = validate_request(update) {
            warn!(%rejection, "dropping invalid request");
            return None;
        }

        let command = Command::parse(update);
        info!(command = command.name(), "request received");

        if !self.guard.admit(update.user_id) {
            return Some(Reply::text(reply::RATE_LIMITED));
        }

        let reply = match command {
            Command::Start => Reply::welcome(),
            Command::PromptAddress => Reply::text(reply::ENTER_ADDRESS),
            Command::SetLocation(address) => self.set_location(update.user_id, &address).await,
            Command::GetTransport => self.get_transport(update.user_id).await,
            Command::Unknown(_) => Reply::text(reply::UNKNOWN_COMMAND),
        };
        Some(reply)
    }

    async fn set_location(&self, user_id: UserId, address: &str) -> Reply {
        let address = match validate_address(address) {
            Ok(address) => address,
            Err(ValidationError::EmptyAddress) => return Reply::text(reply::ENTER_ADDRESS),
            Err(err) => {
                warn!(error = %err, "rejected address");
                return Reply::text(reply::INVALID_ADDRESS);
            }
        };

        let location = match self.geocoder.geocode(address).await {
            Ok(Some(location)) => location,
            Ok(None) => return Reply::text(reply::LOCATION_NOT_FOUND),
            Err(report) => {
                error!(error = ?report, "geocoding failed");
                return Reply::text(reply::GEOCODER_ERROR);
            }
        };

        if let Err(report) = self.store.save(user_id, &location).await {
            error!(error = ?report, "failed to save location");
            return Reply::text(reply::STORAGE_ERROR);
        }

        info!(lat = location.lat, lon = location.lon, "location saved");
        Reply::location_saved(&location)
    }

    async fn get_transport(&self, user_id: UserId) -> Reply {
        let location = match self.store.latest(user_id).await {
            Ok(Some(location)) => location,
            Ok(None) => return Reply::text(reply::NO_SAVED_LOCATION),
            Err(report) => {
                error!(error = ?report, "failed to load location");
                return Reply::text(reply::STORAGE_ERROR);
            }
        };

        match self.fetcher.departures_near(&location).await {
            Ok(entries) => Reply::departures(&location, &entries),
            Err(err) => {
                warn!(
                    error = %err,
                    kind = ?err.kind(),
                    transient = err.is_transient(),
                    "departures unavailable"
                );
                Reply::fetch_failed(&err)
            }
        }
    }
}
