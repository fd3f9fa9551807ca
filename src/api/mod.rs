//! HTTP API.
//!
//! Exposes triage, note generation, the audit trail and model status over
//! axum. Model-backed routes are rate-limited per client and their responses
//! cached; every clinical route is recorded in the audit log.

pub mod cache;
pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use cache::ResponseCache;
pub use error::ApiError;
pub use router::build_router;
pub use server::{build_services, start_server, ApiServer, AppServices, ServerError};
pub use types::ApiContext;
