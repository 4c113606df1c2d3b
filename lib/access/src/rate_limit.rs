//! Sliding-window rate limiting.
//!
//! Every key keeps the timestamps of its admitted calls within the trailing
//! window. A call is admitted while every policy applied to the key still has
//! room after purging the expired timestamps. Denied calls are never
//! recorded, so hammering a full window does not push its reset further out.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use transit_bot_core::{Clock, SystemClock, UserId};

/// A single limit: at most `max_requests` per `window_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration in seconds.
    pub window_seconds: u32,
}

impl RateLimitPolicy {
    /// Creates a new policy.
    #[must_use]
    pub fn new(max_requests: u32, window_seconds: u32) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    /// Common limit: requests per minute.
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }

    /// Common limit: requests per hour.
    #[must_use]
    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(max_requests, 3600)
    }

    /// Returns the window as a duration.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::from(self.window_seconds))
    }
}

/// The policies the bot enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Applied to each user's interactions.
    pub per_user: RateLimitPolicy,
    /// Short-window throttle applied to each user alongside `per_user`.
    pub burst: RateLimitPolicy,
    /// Applied to all upstream API traffic combined.
    pub api: RateLimitPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_user: RateLimitPolicy::per_hour(100),
            burst: RateLimitPolicy::per_minute(10),
            api: RateLimitPolicy::per_hour(1000),
        }
    }
}

/// Identifies a tracked window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// One user's interactions.
    User(UserId),
    /// Aggregate upstream API traffic.
    Api,
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// Recent call history for one key, oldest first.
#[derive(Debug, Default)]
struct RateWindow {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl RateWindow {
    /// Drops every timestamp at or before `cutoff`.
    fn purge(&mut self, cutoff: DateTime<Utc>) {
        while self.timestamps.front().is_some_and(|t| *t <= cutoff) {
            self.timestamps.pop_front();
        }
    }

    /// Counts the timestamps strictly after `cutoff`.
    fn count_since(&self, cutoff: DateTime<Utc>) -> usize {
        self.timestamps
            .iter()
            .rev()
            .take_while(|t| **t > cutoff)
            .count()
    }
}

/// Sliding-window rate limiter shared by all request handlers.
///
/// Windows live in a sharded map. The purge-evaluate-append sequence for a
/// key runs while holding that key's shard lock, so concurrent callers for
/// the same key cannot both take the last slot. Clones share state.
///
/// Several policies can guard one key. They are evaluated against the same
/// timestamp history, so a call is recorded once and only when every policy
/// admits it.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<DashMap<RateKey, RateWindow>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a rate limiter using the system clock.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a rate limiter using the given time source.
    #[must_use]
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            windows: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Admits a call for `key` if every policy in `policies` has room in its
    /// trailing window, recording it once on admission.
    ///
    /// An empty policy list admits without recording.
    pub fn allow(&self, key: RateKey, policies: &[RateLimitPolicy]) -> bool {
        let Some(longest) = policies.iter().map(RateLimitPolicy::window).max() else {
            return true;
        };

        let now = self.clock.now();
        let mut entry = self.windows.entry(key).or_default();
        entry.purge(now - longest);

        for policy in policies {
            if entry.count_since(now - policy.window()) >= policy.max_requests as usize {
                debug!(
                    key = %key,
                    limit = policy.max_requests,
                    window_seconds = policy.window_seconds,
                    "rate limit exceeded"
                );
                return false;
            }
        }

        entry.timestamps.push_back(now);
        true
    }

    /// Checks and records one interaction for `user_id` against both the
    /// hourly and the burst policy.
    pub fn try_user(&self, user_id: UserId) -> bool {
        self.allow(
            RateKey::User(user_id),
            &[self.config.per_user, self.config.burst],
        )
    }

    /// Checks and records one upstream API call.
    pub fn try_api_call(&self) -> bool {
        self.allow(RateKey::Api, &[self.config.api])
    }

    /// Returns the time source shared with dependent components.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}
