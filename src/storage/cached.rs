use crate::models::Link;
use crate::storage::{LinkStore, StoreError, StoreResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Cached lookup result; `link: None` records that the slug is known absent
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub slug: String,
    pub link: Option<Link>,
    pub inserted_at: Instant,
}

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub struct Lookup {
    pub link: Option<Link>,
    pub cache_hit: bool,
}

type FetchResult = StoreResult<Option<Link>>;

/// A store fetch other resolvers can wait on
struct InFlight {
    id: u64,
    result: watch::Receiver<Option<FetchResult>>,
}

/// Read-through TTL cache in front of a [`LinkStore`].
///
/// Concurrent misses for one slug share a single store fetch. The fetch runs
/// in its own task, so a caller that goes away does not cancel it and its
/// result still lands in the cache.
pub struct LinkCache {
    links: Arc<LinkStore>,
    entries: Cache<String, CacheEntry>,
    in_flight: Arc<DashMap<String, InFlight>>,
    ttl: Duration,
    next_fetch_id: AtomicU64,
}

impl LinkCache {
    pub fn new(links: Arc<LinkStore>, ttl: Duration, max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl.max(Duration::from_millis(1)))
            .build();

        Self {
            links,
            entries,
            in_flight: Arc::new(DashMap::new()),
            ttl,
            next_fetch_id: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<LinkStore> {
        &self.links
    }

    /// Look up a normalized slug, consulting the store on a miss
    pub async fn resolve(&self, slug: &str) -> StoreResult<Lookup> {
        if let Some(entry) = self.entries.get(slug) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Ok(Lookup {
                    link: entry.link,
                    cache_hit: true,
                });
            }
        }

        let mut rx = self.join_or_start_fetch(slug);
        let result = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| StoreError::Unavailable("lookup task aborted".to_string()))?
            .clone();

        match result {
            Some(result) => result.map(|link| Lookup {
                link,
                cache_hit: false,
            }),
            None => Err(StoreError::Unavailable("lookup task aborted".to_string())),
        }
    }

    /// Drop the cached entry and detach any fetch that started before the write
    pub fn invalidate(&self, slug: &str) {
        self.in_flight.remove(slug);
        self.entries.invalidate(slug);
    }

    /// Seed the cache with a freshly written link
    pub fn prime(&self, slug: &str, link: Link) {
        self.in_flight.remove(slug);
        self.entries.insert(
            slug.to_string(),
            CacheEntry {
                slug: slug.to_string(),
                link: Some(link),
                inserted_at: Instant::now(),
            },
        );
    }

    fn join_or_start_fetch(&self, slug: &str) -> watch::Receiver<Option<FetchResult>> {
        let (id, tx, rx) = match self.in_flight.entry(slug.to_string()) {
            Entry::Occupied(entry) => return entry.get().result.clone(),
            Entry::Vacant(entry) => {
                let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                entry.insert(InFlight {
                    id,
                    result: rx.clone(),
                });
                (id, tx, rx)
            }
        };

        let links = Arc::clone(&self.links);
        let entries = self.entries.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let slug = slug.to_string();

        tokio::spawn(async move {
            tracing::debug!(slug = %slug, "cache miss, fetching from store");
            let result = links.get(&slug).await;

            // Only the fetch still registered for this slug may fill the cache;
            // an invalidation in the meantime means the result may be stale.
            if let Entry::Occupied(current) = in_flight.entry(slug.clone()) {
                if current.get().id == id {
                    if let Ok(link) = &result {
                        entries.insert(
                            slug.clone(),
                            CacheEntry {
                                slug: slug.clone(),
                                link: link.clone(),
                                inserted_at: Instant::now(),
                            },
                        );
                    }
                    current.remove();
                }
            }

            if let Err(err) = &result {
                tracing::warn!(slug = %slug, error = %err, "store lookup failed");
            }
            let _ = tx.send(Some(result));
        });

        rx
    }
}
