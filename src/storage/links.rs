use crate::models::Link;
use crate::storage::{KeyValueStore, StoreError, StoreResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Namespace for link records in the key-value store
pub const LINK_PREFIX: &str = "link:";

/// Typed access to links on top of a [`KeyValueStore`].
///
/// Every call is bounded by `timeout`; an elapsed call is reported as
/// [`StoreError::Unavailable`].
pub struct LinkStore {
    kv: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

pub fn link_key(slug: &str) -> String {
    format!("{LINK_PREFIX}{slug}")
}

impl LinkStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self { kv, timeout }
    }

    pub fn max_list_size(&self) -> usize {
        self.kv.max_list_size()
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(StoreError::Unavailable(format!(
                    "{op} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    pub async fn get(&self, slug: &str) -> StoreResult<Option<Link>> {
        let key = link_key(slug);
        let raw = self.bounded("get", self.kv.get(&key)).await?;
        raw.map(|bytes| decode(&key, &bytes)).transpose()
    }

    /// Insert a new link; returns `false` when the slug is already taken
    pub async fn insert(&self, link: &Link) -> StoreResult<bool> {
        let key = link_key(&link.slug);
        let value = encode(&key, link)?;
        self.bounded(
            "put_if_absent",
            self.kv.put_if_absent(&key, value, expiry_ttl(link)),
        )
        .await
    }

    /// Overwrite an existing link
    pub async fn put(&self, link: &Link) -> StoreResult<()> {
        let key = link_key(&link.slug);
        let value = encode(&key, link)?;
        self.bounded("put", self.kv.put(&key, value, expiry_ttl(link)))
            .await
    }

    pub async fn delete(&self, slug: &str) -> StoreResult<()> {
        let key = link_key(slug);
        self.bounded("delete", self.kv.delete(&key)).await
    }

    /// List links after the slug `after`, in slug order
    pub async fn list(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<(Vec<Link>, Option<String>)> {
        let cursor = after.map(link_key);
        let page = self
            .bounded(
                "list_by_prefix",
                self.kv.list_by_prefix(LINK_PREFIX, cursor.as_deref(), limit),
            )
            .await?;

        let links = page
            .items
            .iter()
            .map(|(key, bytes)| decode(key, bytes))
            .collect::<StoreResult<Vec<_>>>()?;
        let next = page
            .next_cursor
            .map(|key| key.trim_start_matches(LINK_PREFIX).to_string());

        Ok((links, next))
    }
}

/// Let the store drop a link on its own once it expires
fn expiry_ttl(link: &Link) -> Option<Duration> {
    let expires_at = link.expires_at?;
    let remaining = expires_at - chrono::Utc::now().timestamp();
    (remaining > 0).then(|| Duration::from_secs(remaining as u64))
}

fn encode(key: &str, link: &Link) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(link).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn decode(key: &str, bytes: &[u8]) -> StoreResult<Link> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
