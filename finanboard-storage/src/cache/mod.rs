//! Query cache with explicit freshness and versioned entries.
//!
//! The cache maps a [`QueryKey`](finanboard_core::QueryKey) to the last
//! known result set for that query plus its fetch state. Screens read from
//! it, mutations write provisional values into it, and reconciliation
//! fetches bring it back in line with the remote store.
//!
//! # Example
//!
//! ```ignore
//! let cache = Arc::new(QueryCache::new(
//!     Arc::new(StoreFetcher::new(store.clone())),
//!     CacheConfig::default(),
//! ));
//!
//! // Serve cached rows if the last fetch is under a minute old
//! let read = cache
//!     .fetch_query(&key, Freshness::best_effort(Duration::from_secs(60)))
//!     .await?;
//!
//! // Mark stale and refetch in the background
//! cache.invalidate_in_background(&key);
//! ```

pub mod entry;
pub mod freshness;
pub mod query_cache;
pub mod traits;
pub mod version;

pub use entry::CacheEntry;
pub use freshness::{CacheRead, Freshness};
pub use query_cache::{CacheChange, CacheConfig, CacheEvent, FetchTicket, Modified, QueryCache};
pub use traits::{CacheStats, QueryFetcher, StoreFetcher};
pub use version::EntryVersion;
