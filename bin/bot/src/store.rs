//! Saved user locations.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use transit_bot_core::{Location, Result, UserId};

use crate::error::StoreError;

/// Persists one preferred location per user.
///
/// Saving never overwrites history; the most recent save is the active
/// location.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Records `location` as the user's current location.
    async fn save(&self, user_id: UserId, location: &Location) -> Result<(), StoreError>;

    /// Returns the user's most recently saved location.
    async fn latest(&self, user_id: UserId) -> Result<Option<Location>, StoreError>;
}

/// PostgreSQL-backed store over the `user_locations` table.
#[derive(Debug, Clone)]
pub struct PgLocationStore {
    pool: PgPool,
}

/// Row type for location queries.
#[derive(FromRow)]
struct LocationRow {
    latitude: f64,
    longitude: f64,
    name: String,
}

impl LocationRow {
    fn try_into_location(self) -> Result<Location, StoreError> {
        let location = Location::new(self.latitude, self.longitude, self.name).map_err(|e| {
            StoreError::CorruptRow {
                details: e.to_string(),
            }
        })?;
        Ok(location)
    }
}

impl PgLocationStore {
    /// Creates a store using `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationStore for PgLocationStore {
    #[instrument(skip(self, location), fields(user_id = %user_id))]
    async fn save(&self, user_id: UserId, location: &Location) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_locations (user_id, latitude, longitude, name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id.get())
        .bind(location.lat)
        .bind(location.lon)
        .bind(&location.name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError {
            operation: "save_location",
            details: e.to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn latest(&self, user_id: UserId) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT latitude, longitude, name
            FROM user_locations
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError {
            operation: "get_location",
            details: e.to_string(),
        })?;

        match row {
            Some(row) => Ok(Some(row.try_into_location()?)),
            None => Ok(None),
        }
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryLocationStore {
    locations: DashMap<UserId, Location>,
}

impl InMemoryLocationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn save(&self, user_id: UserId, location: &Location) -> Result<(), StoreError> {
        self.locations.insert(user_id, location.clone());
        Ok(())
    }

    async fn latest(&self, user_id: UserId) -> Result<Option<Location>, StoreError> {
        Ok(self.locations.get(&user_id).map(|l| l.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_latest_save_wins() {
        let store = InMemoryLocationStore::new();
        let user = UserId::new(7);

        assert!(store.latest(user).await.expect("read").is_none());

        let first = Location::new(44.84, -0.58, "Bordeaux").expect("valid");
        let second = Location::new(44.80, -0.63, "Pessac").expect("valid");
        store.save(user, &first).await.expect("save");
        store.save(user, &second).await.expect("save");

        assert_eq!(store.latest(user).await.expect("read"), Some(second));
    }

    #[tokio::test]
    async fn in_memory_users_are_isolated() {
        let store = InMemoryLocationStore::new();
        let location = Location::new(44.84, -0.58, "Bordeaux").expect("valid");

        store.save(UserId::new(1), &location).await.expect("save");
        assert!(store.latest(UserId::new(2)).await.expect("read").is_none());
    }

    #[test]
    fn corrupt_row_is_rejected() {
        let row = LocationRow {
            latitude: 123.0,
            longitude: 0.0,
            name: "Broken".to_string(),
        };
        assert!(row.try_into_location().is_err());
    }
}
