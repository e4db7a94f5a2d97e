//! FinanBoard Storage - Remote Store Contract and Query Cache
//!
//! Defines the async CRUD contract for the hosted database, an in-memory
//! implementation of it, and the keyed query cache that screens read from.

pub mod cache;
pub mod memory;
pub mod remote;

pub use memory::InMemoryRemoteStore;
pub use remote::{RemoteStore, WriteOp, WriteOutcome};

pub use cache::{
    CacheChange, CacheConfig, CacheEntry, CacheEvent, CacheRead, CacheStats, EntryVersion,
    FetchTicket, Freshness, Modified, QueryCache, QueryFetcher, StoreFetcher,
};
