//! Repository Module
//!
//! SDK-side feature repository: fetches payloads, coalesces concurrent
//! fetches, serves stale data while revalidating, and persists the cache
//! to durable storage.

mod clock;
mod entry;
mod fetcher;
mod key;
mod persist;
mod stats;
mod storage;
mod store;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use fetcher::{features_url, FeatureFetcher, HttpFetcher};
pub use key::{RepositoryKey, KEY_SEPARATOR};
pub use stats::RepositoryStats;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, NullStorage};
pub use store::{FeatureRepository, Payload};
