//! SDK Payload Module
//!
//! Capability negotiation and scrubbing of canonical feature definitions
//! into payloads that a specific SDK build can parse.

mod capability;
mod definitions;
mod scrub;
pub mod walk;


// Re-export public types
pub use capability::{Capability, CapabilitySet};
pub use definitions::{
    DefinitionCatalog, DefinitionSet, Experiment, FeatureDefinition, FeatureMap, IdLists, Rule,
};
pub use scrub::{
    allowed_rule_keys, build_payload, scrub_experiments, scrub_features, scrub_id_lists,
    FeatureApiResponse, BUCKETING_V2_RULE_KEYS, PREREQUISITE_RULE_KEYS, STICKY_BUCKETING_RULE_KEYS,
    STRICT_RULE_KEYS,
};
