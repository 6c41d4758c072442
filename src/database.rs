use crate::constants::PASTE_TTL_HOURS;
use crate::error::StoreError;
use crate::models::PasteRecord;
use crate::store::PasteStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    ttl: Duration,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool))
    }

    /// Private in-memory database. A single pooled connection is kept open
    /// forever since every SQLite memory connection is its own database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            ttl: Duration::hours(PASTE_TTL_HOURS),
        }
    }

    /// Overrides the retention window (tests use a zero TTL to simulate expiry).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migration check complete");
        Ok(())
    }

    pub async fn get_record(&self, id: &str) -> Result<Option<PasteRecord>, StoreError> {
        let now = Utc::now().timestamp_millis();
        let record = sqlx::query_as::<_, PasteRecord>(
            r#"
            SELECT id, content, created_at, expires_at
            FROM pastes
            WHERE id = ? AND expires_at > ?
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn cleanup_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            DELETE FROM pastes
            WHERE expires_at <= ?
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_live(&self) -> Result<i64, StoreError> {
        let now = Utc::now().timestamp_millis();
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM pastes
            WHERE expires_at > ?
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl PasteStore for Database {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.get_record(id).await?.map(|record| record.content))
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.cleanup_expired().await
    }

    async fn create(&self, id: &str, content: &[u8]) -> Result<bool, StoreError> {
        let record = PasteRecord::new(id, content, Utc::now(), self.ttl);

        // A row whose TTL has elapsed but which the sweeper has not removed
        // yet counts as absent; a live row is left alone and nothing changes.
        let result = sqlx::query(
            r#"
            INSERT INTO pastes (id, content, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            WHERE pastes.expires_at <= ?3
            "#,
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
