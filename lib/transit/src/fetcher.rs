//! Rate-governed, retrying client for the transit API.
//!
//! A fetch first spends one unit of the aggregate API budget, then makes up to
//! `max_retries` tries. Each try is bounded by `timeout` (connect + read).
//! Rate-limit answers, timeouts and transport errors are retried after a
//! linear backoff of `retry_delay * try_number`; other statuses and bad bodies
//! fail at once.

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use transit_bot_access::RateLimiter;
use transit_bot_core::Location;

use crate::entry::{TransitEntry, TransitQuery, parse_results};
use crate::error::FetchError;

/// Default per-try timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of tries per fetch.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff unit.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connection settings for the transit API.
#[derive(Clone)]
pub struct FetcherConfig {
    /// Endpoint queried with `GET ?lat=..&lon=..`.
    pub base_url: String,
    /// Sent as a bearer token.
    pub api_key: String,
    /// Per-try timeout covering connect and read.
    pub timeout: Duration,
    /// Total number of tries, including the first.
    pub max_retries: u32,
    /// Backoff unit; try `n` is followed by a `retry_delay * n` pause.
    pub retry_delay: Duration,
}

impl FetcherConfig {
    /// Creates a configuration with the default timeout and retry policy.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Sets the per-try timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of tries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff unit.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

impl fmt::Debug for FetcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// Outcome of a single try.
enum Attempt {
    Done(Vec<TransitEntry>),
    Transient(FetchError),
    Fatal(FetchError),
}

/// Retry bookkeeping for one fetch.
#[derive(Debug)]
struct RetryState {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
    last_error: Option<FetchError>,
}

impl RetryState {
    fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts: max_attempts.max(1),
            base_delay,
            last_error: None,
        }
    }

    /// Starts the next try and returns its 1-based number.
    fn start_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Records a transient failure. Returns the pause before the next try,
    /// or `None` if the budget is spent.
    fn record_transient(&mut self, error: FetchError) -> Option<Duration> {
        self.last_error = Some(error);
        (self.attempts < self.max_attempts).then(|| self.base_delay * self.attempts)
    }

    fn into_error(self) -> FetchError {
        self.last_error.unwrap_or_else(|| FetchError::Network {
            reason: "no attempt was made".to_string(),
        })
    }
}

/// Client for the transit API.
///
/// Cheap to share behind an `Arc`; the underlying `reqwest::Client` pools
/// connections.
#[derive(Debug)]
pub struct ResilientFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    limiter: RateLimiter,
}

impl ResilientFetcher {
    /// Creates a fetcher that spends `limiter`'s aggregate API budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: FetcherConfig, limiter: RateLimiter) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    /// Fetches departures near `location`.
    ///
    /// Coordinates are validated before anything else happens.
    pub async fn departures_near(
        &self,
        location: &Location,
    ) -> Result<Vec<TransitEntry>, FetchError> {
        let query = TransitQuery::near(location)?;
        self.fetch(&query).await
    }

    /// Performs one logical upstream call.
    ///
    /// Returns a non-empty list of valid entries, or the classified failure
    /// of the last try.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn fetch(&self, query: &TransitQuery) -> Result<Vec<TransitEntry>, FetchError> {
        if !self.limiter.try_api_call() {
            warn!("aggregate transit API budget exhausted");
            return Err(FetchError::RateLimited);
        }

        let mut retry = RetryState::new(self.config.max_retries, self.config.retry_delay);
        loop {
            let attempt = retry.start_attempt();
            match self.try_once(query).await {
                Attempt::Done(entries) => {
                    debug!(attempt, entries = entries.len(), "transit fetch succeeded");
                    return Ok(entries);
                }
                Attempt::Fatal(error) => {
                    warn!(attempt, error = %error, "transit fetch failed");
                    return Err(error);
                }
                Attempt::Transient(error) => {
                    warn!(attempt, error = %error, "transient transit fetch failure");
                    match retry.record_transient(error) {
                        Some(delay) => {
                            debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(retry.into_error()),
                    }
                }
            }
        }
    }

    async fn try_once(&self, query: &TransitQuery) -> Attempt {
        let response = match self
            .client
            .get(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .query(query.params())
            .send()
            .await
        {
            Ok(response) => response,
            // The request could not be built (bad URL, bad header); every
            // retry would fail the same way.
            Err(e) if e.is_builder() => return Attempt::Fatal(FetchError::from_transport(&e)),
            Err(e) => return Attempt::Transient(FetchError::from_transport(&e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Transient(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Attempt::Fatal(FetchError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::Transient(FetchError::from_transport(&e)),
        };

        match parse_results(&body) {
            Ok(entries) => Attempt::Done(entries),
            Err(error) => Attempt::Fatal(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear_and_bounded() {
        let mut retry = RetryState::new(3, Duration::from_secs(1));

        assert_eq!(retry.start_attempt(), 1);
        assert_eq!(
            retry.record_transient(FetchError::Timeout),
            Some(Duration::from_secs(1))
        );
        assert_eq!(retry.start_attempt(), 2);
        assert_eq!(
            retry.record_transient(FetchError::RateLimited),
            Some(Duration::from_secs(2))
        );
        assert_eq!(retry.start_attempt(), 3);
        assert_eq!(retry.record_transient(FetchError::Timeout), None);
        assert_eq!(retry.into_error(), FetchError::Timeout);
    }

    #[test]
    fn zero_retries_still_tries_once() {
        let mut retry = RetryState::new(0, Duration::from_secs(1));
        assert_eq!(retry.start_attempt(), 1);
        assert_eq!(retry.record_transient(FetchError::Timeout), None);
    }

    #[test]
    fn config_defaults_and_redaction() {
        let config = FetcherConfig::new("https://api.example.test/departures", "secret-key");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));

        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}
