pub mod cached;
pub mod links;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::{CacheEntry, LinkCache, Lookup};
pub use links::{link_key, LinkStore, LINK_PREFIX};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use trait_def::{KeyPage, KeyValueStore, StoreError, StoreResult};
