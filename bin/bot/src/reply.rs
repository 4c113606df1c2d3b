//! Replies sent back to the chat transport, and their English templates.

use serde::{Deserialize, Serialize};
use transit_bot_core::Location;
use transit_bot_transit::{FetchError, FetchErrorKind, TransitEntry};

/// Inline button callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    /// Prompts for an address.
    SetLocation,
    /// Lists departures near the saved location.
    GetTransport,
    /// Same flow as `SetLocation`, offered once a location is saved.
    ChangeLocation,
}

impl ButtonAction {
    fn label(self) -> &'static str {
        match self {
            Self::SetLocation => "📍 Set location",
            Self::GetTransport => "🚌 Get transport",
            Self::ChangeLocation => "✏️ Change location",
        }
    }
}

/// A button rendered under a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Text shown on the button.
    pub label: String,
    /// Callback sent back when the button is pressed.
    pub action: ButtonAction,
}

impl From<ButtonAction> for Button {
    fn from(action: ButtonAction) -> Self {
        Self {
            label: action.label().to_string(),
            action,
        }
    }
}

/// A text reply with optional buttons, one per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Message body.
    pub text: String,
    /// Omitted from JSON when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl Reply {
    /// Creates a plain text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// Adds a button.
    #[must_use]
    pub fn with_button(mut self, action: ButtonAction) -> Self {
        self.buttons.push(action.into());
        self
    }

    /// The `/start` greeting, with buttons for both commands.
    #[must_use]
    pub fn welcome() -> Self {
        Self::text(WELCOME)
            .with_button(ButtonAction::SetLocation)
            .with_button(ButtonAction::GetTransport)
    }

    /// Confirms a saved location.
    #[must_use]
    pub fn location_saved(location: &Location) -> Self {
        Self::text(format!("📍 Current location: {}", location.name))
            .with_button(ButtonAction::ChangeLocation)
    }

    /// Lists `entries` one per line under a header naming `location`.
    #[must_use]
    pub fn departures(location: &Location, entries: &[TransitEntry]) -> Self {
        let mut text = format!("🚏 Departures near {}:", location.name);
        for entry in entries {
            text.push('\n');
            text.push_str(&entry.to_string());
        }
        Self::text(text)
    }

    /// Maps a fetch failure onto its user-facing message.
    pub fn fetch_failed(error: &FetchError) -> Self {
        let text = match error.kind() {
            FetchErrorKind::RateLimited => API_BUSY,
            FetchErrorKind::Timeout => TIMEOUT,
            FetchErrorKind::EmptyResponse => NO_DEPARTURES,
            FetchErrorKind::ValidationError => INVALID_SAVED_LOCATION,
            FetchErrorKind::Network
            | FetchErrorKind::UpstreamStatus
            | FetchErrorKind::MalformedResponse => API_ERROR,
        };
        Self::text(text)
    }
}

// English message templates.

/// Greeting and command overview.
pub const WELCOME: &str = "👋 Welcome to the Bordeaux Métropole transport bot!\n\n\
    Save a location, then ask for the next departures around it.\n\n\
    /set_location <address> - Save your location\n\
    /get_transport - Departures near your saved location";
/// The user's own hourly or per-minute budget is spent.
pub const RATE_LIMITED: &str =
    "You are sending requests too quickly. Please wait a while and try again.";
/// `/set_location` without an address.
pub const ENTER_ADDRESS: &str =
    "Send your address with the command. Example: /set_location Place de la Victoire";
/// Empty or over-long address.
pub const INVALID_ADDRESS: &str =
    "That address is not valid. Use up to 200 characters and try again.";
/// The geocoder found no match.
pub const LOCATION_NOT_FOUND: &str = "Could not find that location. Please try another address.";
/// The geocoder failed.
pub const GEOCODER_ERROR: &str =
    "Sorry, the address lookup service is unavailable. Please try again later.";
/// `/get_transport` before any location was saved.
pub const NO_SAVED_LOCATION: &str =
    "You have no saved location yet. Use /set_location <address> first.";
/// The transit API returned no usable departures.
pub const NO_DEPARTURES: &str = "No departures scheduled at the moment.";
/// The transit API, or our aggregate budget for it, is rate limited.
pub const API_BUSY: &str =
    "The transport service is receiving too many requests. Please try again in a few minutes.";
/// Every try timed out.
pub const TIMEOUT: &str = "The request took too long. Please try again.";
/// Network failures, error statuses and unreadable bodies.
pub const API_ERROR: &str =
    "Sorry, an error occurred while communicating with the transport API.";
/// The stored coordinates no longer validate.
pub const INVALID_SAVED_LOCATION: &str =
    "Your saved location is not valid. Please set it again with /set_location.";
/// The location store failed.
pub const STORAGE_ERROR: &str = "An unexpected error occurred. Please try again later.";
/// Anything that is not a known command or button.
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /start to see what I can do.";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use transit_bot_core::ValidationError;

    #[test]
    fn each_failure_kind_has_its_own_message() {
        let errors = [
            FetchError::RateLimited,
            FetchError::Timeout,
            FetchError::UpstreamStatus { status: 500 },
            FetchError::EmptyResponse,
            FetchError::InvalidInput(ValidationError::InvalidCoordinates { lat: 95.0, lon: 0.0 }),
        ];
        let texts: HashSet<String> = errors
            .iter()
            .map(|e| Reply::fetch_failed(e).text)
            .chain([RATE_LIMITED.to_string(), INVALID_ADDRESS.to_string()])
            .collect();
        assert_eq!(texts.len(), errors.len() + 2);
    }

    #[test]
    fn transport_failures_share_api_error() {
        let network = FetchError::Network {
            reason: "reset".to_string(),
        };
        let malformed = FetchError::MalformedResponse {
            reason: "eof".to_string(),
        };
        assert_eq!(Reply::fetch_failed(&network).text, API_ERROR);
        assert_eq!(Reply::fetch_failed(&malformed).text, API_ERROR);
    }

    #[test]
    fn departures_list_one_line_per_entry() {
        let location = Location::new(44.84, -0.58, "Bordeaux").expect("valid");
        let entries = vec![
            TransitEntry {
                line: "A".to_string(),
                destination: "La Gardette".to_string(),
                time: "12:04".to_string(),
                kind: "tram".to_string(),
            },
            TransitEntry {
                line: "15".to_string(),
                destination: "Gare Saint-Jean".to_string(),
                time: "12:07".to_string(),
                kind: "bus".to_string(),
            },
        ];

        let reply = Reply::departures(&location, &entries);
        assert_eq!(
            reply.text,
            "🚏 Departures near Bordeaux:\nA - La Gardette (12:04)\n15 - Gare Saint-Jean (12:07)"
        );
        assert!(reply.buttons.is_empty());
    }

    #[test]
    fn welcome_offers_both_actions() {
        let actions: Vec<_> = Reply::welcome().buttons.iter().map(|b| b.action).collect();
        assert_eq!(
            actions,
            vec![ButtonAction::SetLocation, ButtonAction::GetTransport]
        );
    }

    #[test]
    fn button_action_wire_names() {
        assert_eq!(
            serde_json::to_value(ButtonAction::ChangeLocation).expect("serialize"),
            serde_json::json!("change_location")
        );
    }
}
