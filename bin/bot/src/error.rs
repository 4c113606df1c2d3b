//! Domain error types for the bot's collaborators and startup.
//!
//! Collaborators return `Report<E>` with one of these as the context, so
//! handlers can log the full chain while still matching on the kind.

use std::fmt;
use transit_bot_core::ValidationError;

/// Location store errors.
#[derive(Debug)]
pub enum StoreError {
    /// The database rejected or failed the query.
    DatabaseError {
        operation: &'static str,
        details: String,
    },
    /// A stored row holds coordinates that no longer validate.
    CorruptRow { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseError { operation, details } => {
                write!(f, "database error during {}: {}", operation, details)
            }
            Self::CorruptRow { details } => write!(f, "corrupt location row: {}", details),
        }
    }
}

impl std::error::Error for StoreError {}

/// Geocoding errors.
#[derive(Debug)]
pub enum GeocodeError {
    /// The address failed validation before lookup.
    InvalidAddress(ValidationError),
    /// The provider could not be reached or answered with an error status.
    RequestFailed { details: String },
    /// The provider's answer could not be interpreted.
    MalformedResponse { details: String },
}

impl fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress(err) => write!(f, "invalid address: {}", err),
            Self::RequestFailed { details } => write!(f, "geocoding request failed: {}", details),
            Self::MalformedResponse { details } => {
                write!(f, "malformed geocoding response: {}", details)
            }
        }
    }
}

impl std::error::Error for GeocodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidAddress(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors that abort startup.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration is missing or invalid.
    Config { details: String },
    /// The database could not be reached.
    Database { details: String },
    /// Migrations failed.
    Migration { details: String },
    /// An HTTP client could not be built.
    HttpClient { details: String },
    /// The listener could not bind.
    Bind { addr: String, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {}", details),
            Self::Database { details } => write!(f, "failed to connect to database: {}", details),
            Self::Migration { details } => write!(f, "failed to run migrations: {}", details),
            Self::HttpClient { details } => write!(f, "failed to build HTTP client: {}", details),
            Self::Bind { addr, details } => write!(f, "failed to bind to {}: {}", addr, details),
            Self::Serve { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for StartupError {}
