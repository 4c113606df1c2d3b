//! Error handling foundation for transit-bot.
//!
//! This module provides the `Result` type alias using rootcause and the
//! input validation error shared by every layer. Each crate defines its own
//! domain-specific error types in its own error module.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context as errors propagate.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Rejected user input, detected before any network call is attempted.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Latitude or longitude outside the valid range.
    InvalidCoordinates { lat: f64, lon: f64 },
    /// Address is empty.
    EmptyAddress,
    /// Address exceeds the maximum length.
    AddressTooLong { len: usize, max: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCoordinates { lat, lon } => {
                write!(f, "invalid coordinates: lat={lat}, lon={lon}")
            }
            Self::EmptyAddress => write!(f, "address is empty"),
            Self::AddressTooLong { len, max } => {
                write!(f, "address is {len} characters long, maximum is {max}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32, ValidationError> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::InvalidCoordinates {
            lat: 95.0,
            lon: 0.0,
        };
        assert!(err.to_string().contains("lat=95"));

        let err = ValidationError::AddressTooLong { len: 250, max: 200 };
        assert!(err.to_string().contains("250"));
        assert!(err.to_string().contains("200"));
    }
}
