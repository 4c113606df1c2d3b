//! Core domain types and utilities for transit-bot.
//!
//! This crate provides the foundational types, error handling, and shared
//! utilities used by the access layer, the transit client and the bot binary.

pub mod clock;
pub mod error;
pub mod id;
pub mod location;

#[cfg(any(test, feature = "test-helpers"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use error::{Result, ValidationError};
pub use id::UserId;
pub use location::{Location, MAX_ADDRESS_LEN, validate_address, validate_coordinates};
