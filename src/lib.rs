//! Flag Relay - Capability-negotiated feature payloads
//!
//! Scrubs canonical feature and experiment definitions down to what a given
//! SDK build can parse, and provides the SDK-side repository cache that
//! fetches, coalesces, persists and revalidates those payloads.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod sdk;

pub use api::AppState;
pub use config::{Config, RepositoryConfig};
pub use repository::FeatureRepository;
pub use sdk::{build_payload, CapabilitySet, FeatureApiResponse};
