//! Cache Entry Module
//!
//! Defines a cached feature payload together with its freshness deadline.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::sdk::FeatureApiResponse;

// == Cache Entry ==
/// A fetched payload and the instant it stops being fresh.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached payload, shared with every caller that loaded it
    pub data: Arc<FeatureApiResponse>,
    /// Freshness deadline
    pub stale_at: DateTime<Utc>,
    /// Seeded from durable storage and not yet revalidated
    restored: bool,
}

impl CacheEntry {
    // == Constructors ==
    /// Creates an entry for a payload that was just fetched.
    pub fn new(data: Arc<FeatureApiResponse>, stale_at: DateTime<Utc>) -> Self {
        Self {
            data,
            stale_at,
            restored: false,
        }
    }

    /// Creates an entry recovered from durable storage.
    ///
    /// Restored entries count as stale until a fetch replaces them, whatever
    /// their deadline says.
    pub fn restored(data: Arc<FeatureApiResponse>, stale_at: DateTime<Utc>) -> Self {
        Self {
            data,
            stale_at,
            restored: true,
        }
    }

    // == Is Stale ==
    /// An entry is stale once `now >= stale_at`, or if it was restored.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.restored || now >= self.stale_at
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }
}
