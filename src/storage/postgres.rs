use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::storage::trait_def::{check_limit, expiry_millis, like_prefix};
use crate::storage::{KeyPage, KeyValueStore, StoreResult};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub struct PostgresStore {
    pool: Arc<PgPool>,
    max_list_size: usize,
}

impl PostgresStore {
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        max_list_size: usize,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
            max_list_size,
        })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl KeyValueStore for PostgresStore {
    async fn init(&self) -> StoreResult<()> {
        // "C" collation keeps key order byte-wise so cursors resume correctly
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT COLLATE "C" PRIMARY KEY,
                value BYTEA NOT NULL,
                expires_at BIGINT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS access_logs (
                id BIGSERIAL PRIMARY KEY,
                slug TEXT NOT NULL,
                url TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
                referrer TEXT,
                user_agent TEXT,
                ip_hash TEXT,
                country TEXT,
                is_bot BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_access_logs_slug ON access_logs(slug)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let value = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT value FROM kv WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)",
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, expires_at) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO kv (key, value, expires_at) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            WHERE kv.expires_at IS NOT NULL AND kv.expires_at <= $4
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .bind(now_millis())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM kv WHERE key = $1")
            .bind(key)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<KeyPage> {
        check_limit(limit, self.max_list_size)?;

        let mut items = sqlx::query_as::<_, (String, Vec<u8>)>(
            r#"
            SELECT key, value FROM kv
            WHERE key LIKE $1 ESCAPE '\' AND key > $2
              AND (expires_at IS NULL OR expires_at > $3)
            ORDER BY key
            LIMIT $4
            "#,
        )
        .bind(like_prefix(prefix))
        .bind(cursor.unwrap_or(""))
        .bind(now_millis())
        .bind((limit + 1) as i64)
        .fetch_all(self.pool.as_ref())
        .await?;

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|(key, _)| key.clone())
        } else {
            None
        };

        Ok(KeyPage { items, next_cursor })
    }

    fn max_list_size(&self) -> usize {
        self.max_list_size
    }
}

#[async_trait]
impl AnalyticsSink for PostgresStore {
    async fn write(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_logs (slug, url, timestamp, referrer, user_agent, ip_hash, country, is_bot)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&event.slug)
        .bind(&event.url)
        .bind(event.timestamp)
        .bind(&event.referrer)
        .bind(&event.user_agent)
        .bind(&event.ip_hash)
        .bind(&event.country)
        .bind(event.is_bot)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
