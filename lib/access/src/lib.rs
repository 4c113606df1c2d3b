//! Admission control for transit-bot.
//!
//! This crate provides:
//!
//! - **Rate limiter**: Sliding-window limits per user and for the upstream API
//! - **Session guard**: Per-user session admission with credential rotation

pub mod rate_limit;
pub mod session;

pub use rate_limit::{RateKey, RateLimitConfig, RateLimitPolicy, RateLimiter};
pub use session::{DEFAULT_ROTATION_HOURS, Session, SessionGuard, SessionToken};
