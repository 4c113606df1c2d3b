//! Upstream transit API access for transit-bot.
//!
//! This crate provides:
//!
//! - **Transit entries**: Parsed and validated departure records
//! - **Resilient fetcher**: Rate-governed HTTP client with timeout and retry
//! - **Fetch errors**: Classified failures callers can match on

pub mod entry;
pub mod error;
pub mod fetcher;

pub use entry::{EntryDefect, TransitEntry, TransitQuery, parse_results};
pub use error::{FetchError, FetchErrorKind};
pub use fetcher::{FetcherConfig, ResilientFetcher};
