//! Multi-level semantic response cache (spec §4.10).
//!
//! Four layers on top of one [`zimlex_core::CacheStore`]: exact match,
//! embedding-similarity, an intent sub-cache, and an embedding sub-cache.
//! Every layer degrades to a miss on any backend error — a cache failure
//! never fails the request (§4.10's failure mode).

pub mod error;
pub mod inmemory;
pub mod normalize;
pub mod semantic;

pub use error::CacheError;
pub use inmemory::InMemoryCacheStore;
pub use normalize::normalize_query;
pub use semantic::{CacheEntry, CacheLookup, IntentCacheEntry, SemanticCache};
