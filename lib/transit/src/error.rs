//! Error types for upstream transit calls.
//!
//! `FetchError` is returned as a plain value so handlers can match on the
//! failure kind and pick the message shown to the user.

use std::fmt;
use transit_bot_core::ValidationError;

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Local or upstream rate budget exhausted.
    RateLimited,
    /// A try exceeded its timeout.
    Timeout,
    /// Transport-level failure.
    Network,
    /// Upstream rejected the request.
    UpstreamStatus,
    /// Body could not be parsed.
    MalformedResponse,
    /// Body parsed but held no usable entries.
    EmptyResponse,
    /// Request parameters rejected before any network call.
    ValidationError,
}

/// Errors from a transit fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The aggregate API budget is exhausted, or upstream kept answering 429.
    RateLimited,
    /// The final try timed out.
    Timeout,
    /// The final try failed at the transport level.
    Network { reason: String },
    /// Upstream answered with a non-success status other than 429.
    UpstreamStatus { status: u16 },
    /// Body was not the expected JSON structure.
    MalformedResponse { reason: String },
    /// Body was empty or held no valid entries.
    EmptyResponse,
    /// Invalid query parameters.
    InvalidInput(ValidationError),
}

impl FetchError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::RateLimited => FetchErrorKind::RateLimited,
            Self::Timeout => FetchErrorKind::Timeout,
            Self::Network { .. } => FetchErrorKind::Network,
            Self::UpstreamStatus { .. } => FetchErrorKind::UpstreamStatus,
            Self::MalformedResponse { .. } => FetchErrorKind::MalformedResponse,
            Self::EmptyResponse => FetchErrorKind::EmptyResponse,
            Self::InvalidInput(_) => FetchErrorKind::ValidationError,
        }
    }

    /// Returns true for failures where waiting and retrying may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            FetchErrorKind::RateLimited | FetchErrorKind::Timeout | FetchErrorKind::Network
        )
    }

    /// Classifies a reqwest transport error.
    pub(crate) fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network {
                reason: error.to_string(),
            }
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "transit API rate limit exceeded"),
            Self::Timeout => write!(f, "transit API request timed out"),
            Self::Network { reason } => write!(f, "network error: {reason}"),
            Self::UpstreamStatus { status } => {
                write!(f, "transit API request failed with status {status}")
            }
            Self::MalformedResponse { reason } => {
                write!(f, "invalid response from transit API: {reason}")
            }
            Self::EmptyResponse => write!(f, "empty response from transit API"),
            Self::InvalidInput(err) => write!(f, "invalid transit query: {err}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for FetchError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(err)
    }
}
