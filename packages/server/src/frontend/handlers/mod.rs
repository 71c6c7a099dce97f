//! HTTP handler definitions for the front-end dispatcher.
//!
//! Defines `AppState` (the shared state carried through axum extractors)
//! and re-exports the handler functions used when building the router.

pub mod health;
pub mod scrape;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use scrape::{scrape_get_handler, scrape_post_handler};

use std::sync::Arc;

use super::config::FrontendConfig;
use super::gate::AdmissionGate;
use crate::shutdown::ShutdownController;

/// Shared application state passed to all axum handlers via `State`.
///
/// Holds `Arc` references to shared resources so cloning is cheap. The
/// reqwest client is itself internally reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Admission gate bounding concurrent fetch+extract work.
    pub gate: Arc<AdmissionGate>,
    /// Long-lived outbound HTTP client for page fetches.
    pub http: reqwest::Client,
    /// Graceful shutdown controller with health state and in-flight
    /// tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Front-end configuration (bind address, gate capacity, back-end
    /// address, timeouts).
    pub config: Arc<FrontendConfig>,
}
