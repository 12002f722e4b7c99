//! Request DTOs for the payload server API
//!
//! Defines the query parameters accepted by the payload endpoint.

use serde::Deserialize;

use crate::sdk::CapabilitySet;

/// Query string for GET /api/features/:client_key
///
/// # Fields
/// - `capabilities`: Comma-separated capability tags advertised by the SDK
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadQuery {
    /// Capability tags, e.g. `bucketingV2,prerequisites`
    #[serde(default)]
    pub capabilities: Option<String>,
}

impl PayloadQuery {
    /// Parses the advertised tags. Missing, blank and unknown tags are ignored.
    pub fn capability_set(&self) -> CapabilitySet {
        match &self.capabilities {
            Some(raw) => CapabilitySet::from_tags(raw.split(',')),
            None => CapabilitySet::empty(),
        }
    }
}
