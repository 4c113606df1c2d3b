//! Per-user session admission.
//!
//! Every inbound user action passes through [`SessionGuard::admit`], which
//! applies the per-user rate limit and keeps the user's in-memory session
//! fresh. Sessions are not persisted; a restart starts everyone afresh.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use transit_bot_core::{Clock, UserId};

use crate::rate_limit::RateLimiter;

/// Default idle time after which a session's token is rotated.
pub const DEFAULT_ROTATION_HOURS: i64 = 12;

/// Opaque session credential.
///
/// The bytes never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken([u8; 32]);

impl SessionToken {
    /// Generates a token from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Returns the token as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// One user's session epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_id: UserId,
    started_at: DateTime<Utc>,
    token: SessionToken,
}

impl Session {
    fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            started_at: now,
            token: SessionToken::generate(),
        }
    }

    /// Returns the owning user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns when the session was last stamped.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the current credential.
    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Returns true if more than `threshold` has elapsed since `started_at`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.started_at > threshold
    }

    fn rotate(&mut self, now: DateTime<Utc>) {
        self.token = SessionToken::generate();
        self.started_at = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
    }
}

/// Gate in front of every user interaction.
///
/// `admit` combines the per-user rate limit with session upkeep: a user's
/// session is created on first admission, rotated when stale, and stamped on
/// every admitted call.
///
/// The stamp happens on every admission, so the rotation threshold measures
/// time since the user's *last activity* rather than the age of the session.
/// A user active more often than every 12 hours keeps the same token.
#[derive(Debug)]
pub struct SessionGuard {
    limiter: RateLimiter,
    sessions: DashMap<UserId, Session>,
    rotation_threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionGuard {
    /// Creates a guard that shares `limiter`'s windows and clock.
    #[must_use]
    pub fn new(limiter: RateLimiter, rotation_threshold: Duration) -> Self {
        let clock = limiter.clock();
        Self {
            limiter,
            sessions: DashMap::new(),
            rotation_threshold,
            clock,
        }
    }

    /// Decides whether `user_id` may proceed.
    ///
    /// Returns false only when the user's hourly or burst limit is exhausted; callers
    /// should ask the user to try again later. Rotation never denies.
    pub fn admit(&self, user_id: UserId) -> bool {
        if !self.limiter.try_user(user_id) {
            debug!(user_id = %user_id, "admission denied by rate limit");
            return false;
        }

        let now = self.clock.now();
        match self.sessions.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                if session.is_stale(now, self.rotation_threshold) {
                    session.rotate(now);
                    info!(user_id = %user_id, "rotated stale session token");
                }
                session.touch(now);
            }
            Entry::Vacant(entry) => {
                entry.insert(Session::new(user_id, now));
                debug!(user_id = %user_id, "session created");
            }
        }

        true
    }

    /// Forces a token rotation. Returns false if the user has no session.
    pub fn rotate(&self, user_id: UserId) -> bool {
        let now = self.clock.now();
        match self.sessions.get_mut(&user_id) {
            Some(mut session) => {
                session.rotate(now);
                info!(user_id = %user_id, "session token rotated on request");
                true
            }
            None => false,
        }
    }

    /// Returns a snapshot of the user's session.
    #[must_use]
    pub fn session(&self, user_id: UserId) -> Option<Session> {
        self.sessions.get(&user_id).map(|s| s.value().clone())
    }

    /// Returns the number of sessions held in memory.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
