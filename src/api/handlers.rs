//! API Handlers
//!
//! HTTP request handlers for the payload server endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::debug;

use crate::config::Config;
use crate::error::{CatalogError, PayloadError, Result};
use crate::models::{HealthResponse, PayloadQuery};
use crate::sdk::{build_payload, DefinitionCatalog, FeatureApiResponse};

/// Application state shared across all handlers.
///
/// The catalog is read-only, so handlers share it without locking.
#[derive(Clone)]
pub struct AppState {
    /// Canonical definition sets by client key
    pub catalog: Arc<DefinitionCatalog>,
}

impl AppState {
    /// Creates a new AppState with the given catalog.
    pub fn new(catalog: DefinitionCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Loads the definition catalog from the configured path.
    pub fn from_config(config: &Config) -> std::result::Result<Self, CatalogError> {
        let catalog = DefinitionCatalog::from_path(&config.definitions_path)?;
        Ok(Self::new(catalog))
    }
}

/// Handler for GET /api/features/:client_key
///
/// Scrubs the client key's definition set down to what the SDK's
/// advertised capabilities allow.
pub async fn features_handler(
    State(state): State<AppState>,
    Path(client_key): Path<String>,
    Query(query): Query<PayloadQuery>,
) -> Result<Json<FeatureApiResponse>> {
    let definitions = state
        .catalog
        .get(&client_key)
        .ok_or_else(|| PayloadError::UnknownClientKey(client_key.clone()))?;

    let capabilities = query.capability_set();
    debug!(%client_key, ?capabilities, "Building feature payload");

    Ok(Json(build_payload(definitions, capabilities)))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.catalog.len()))
}
