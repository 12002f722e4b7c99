//! API Module
//!
//! HTTP handlers and routing for the payload server.
//!
//! # Endpoints
//! - `GET /api/features/:client_key` - Capability-scrubbed feature payload
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
