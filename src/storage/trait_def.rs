use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient failure reaching the store; callers decide whether to retry
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("list limit {requested} exceeds the maximum of {max}")]
    LimitExceeded { requested: usize, max: usize },
    #[error("value stored under '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of a prefix scan
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    pub items: Vec<(String, Vec<u8>)>,
    /// Key to resume after; `None` when the scan is complete
    pub next_cursor: Option<String>,
}

/// Durable key-value store capability.
///
/// Implementations hold no business logic and never retry internally.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Initialize the store (create tables, etc.)
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value, replacing any existing one. A `ttl` hides the key once elapsed.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write a value only if the key is absent (or expired). Returns whether it was written.
    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List keys sharing `prefix` in key order, resuming after `cursor`.
    ///
    /// A `limit` above [`KeyValueStore::max_list_size`] fails with
    /// [`StoreError::LimitExceeded`] instead of being truncated.
    async fn list_by_prefix(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<KeyPage>;

    fn max_list_size(&self) -> usize;
}

pub(crate) fn check_limit(limit: usize, max: usize) -> StoreResult<()> {
    if limit > max {
        return Err(StoreError::LimitExceeded {
            requested: limit,
            max,
        });
    }
    Ok(())
}

/// Absolute expiry in unix milliseconds for a relative ttl
pub(crate) fn expiry_millis(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| chrono::Utc::now().timestamp_millis() + ttl.as_millis() as i64)
}

/// Escape `%`, `_` and `\` so a prefix can be used in a `LIKE ... ESCAPE '\'` clause
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
