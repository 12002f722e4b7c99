//! Persisted cache record codec.
//!
//! The cache map is stored as a JSON array of
//! `["host||clientKey", { "data": ..., "staleAt": "<ISO-8601>" }]` pairs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::key::RepositoryKey;
use crate::error::RepositoryError;
use crate::sdk::FeatureApiResponse;

#[derive(Serialize)]
struct PersistedEntryRef<'a> {
    data: &'a FeatureApiResponse,
    #[serde(rename = "staleAt")]
    stale_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct PersistedEntry {
    data: FeatureApiResponse,
    #[serde(rename = "staleAt")]
    stale_at: DateTime<Utc>,
}

/// Serializes the cache map, ordered by key.
pub fn encode(entries: &HashMap<RepositoryKey, CacheEntry>) -> serde_json::Result<String> {
    let mut records: Vec<(String, PersistedEntryRef<'_>)> = entries
        .iter()
        .map(|(key, entry)| {
            (
                key.to_string(),
                PersistedEntryRef {
                    data: entry.data.as_ref(),
                    stale_at: entry.stale_at,
                },
            )
        })
        .collect();
    records.sort_by(|a, b| a.0.cmp(&b.0));
    serde_json::to_string(&records)
}

/// Recovers the entries of a persisted cache map that are still fresh at `now`.
///
/// A record that cannot be decoded is dropped on its own; a document that is
/// not a JSON array yields nothing.
pub fn decode(raw: &str, now: DateTime<Utc>) -> HashMap<RepositoryKey, CacheEntry> {
    let records: Vec<Value> = match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, "Ignoring unreadable persisted feature cache");
            return HashMap::new();
        }
    };

    let mut entries = HashMap::with_capacity(records.len());
    for record in records {
        match decode_record(record) {
            Ok((key, persisted)) if persisted.stale_at >= now => {
                let entry = CacheEntry::restored(Arc::new(persisted.data), persisted.stale_at);
                entries.insert(key, entry);
            }
            Ok((key, _)) => debug!(%key, "Discarding expired persisted entry"),
            Err(err) => warn!(error = %err, "Dropping persisted cache entry"),
        }
    }
    entries
}

fn decode_record(record: Value) -> Result<(RepositoryKey, PersistedEntry), RepositoryError> {
    let (raw_key, persisted): (String, PersistedEntry) = serde_json::from_value(record)
        .map_err(|err| RepositoryError::MalformedPersistedEntry(err.to_string()))?;
    let key = RepositoryKey::parse(&raw_key)?;
    Ok((key, persisted))
}
