//! Front-end HTTP module with deferred startup lifecycle.
//!
//! `new()` creates shared resources (admission gate, outbound HTTP client,
//! shutdown controller), `start()` binds the TCP listener, and `serve()`
//! runs the axum server until the shutdown signal fires, then drains
//! in-flight requests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::FrontendConfig;
use super::gate::AdmissionGate;
use super::handlers::{
    health_handler, liveness_handler, readiness_handler, scrape_get_handler,
    scrape_post_handler, AppState,
};
use super::middleware::build_http_layers;
use crate::shutdown::ShutdownController;

/// Manages the front-end HTTP server lifecycle.
///
/// The gate and shutdown controller are allocated in `new()` and shared via
/// `Arc`, so callers can observe them before and during serving.
pub struct FrontendModule {
    config: FrontendConfig,
    listener: Option<TcpListener>,
    gate: Arc<AdmissionGate>,
    http: reqwest::Client,
    shutdown: Arc<ShutdownController>,
}

impl FrontendModule {
    /// Creates the module without binding any port.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be constructed.
    pub fn new(config: FrontendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let gate = Arc::new(AdmissionGate::new(config.concurrency_limit));

        Ok(Self {
            config,
            listener: None,
            gate,
            http,
            shutdown: Arc::new(ShutdownController::new()),
        })
    }

    /// Returns a shared reference to the admission gate.
    #[must_use]
    pub fn gate(&self) -> Arc<AdmissionGate> {
        Arc::clone(&self.gate)
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET|POST /scrape` -- the scrape pipeline
    /// - `GET /health` -- fixed service identification
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    #[must_use]
    pub fn build_router(&self) -> Router {
        let state = AppState {
            gate: Arc::clone(&self.gate),
            http: self.http.clone(),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
        };

        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/scrape", get(scrape_get_handler).post(scrape_post_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(layers)
            .with_state(state)
    }

    /// Binds the TCP listener to the configured address.
    ///
    /// An IPv6 literal in the configuration yields an IPv6 socket. Returns
    /// the actual bound address (relevant with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let addr = SocketAddr::new(self.config.host, self.config.port);
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;

        info!(%bound, "front-end listener bound");
        self.listener = Some(listener);
        Ok(bound)
    }

    /// Serves HTTP requests until `shutdown` resolves, then drains.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(mut self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .expect("start() must be called before serve()");

        let router = self.build_router();
        let ctrl = Arc::clone(&self.shutdown);
        let drain_timeout = self.config.request_timeout;

        ctrl.set_ready();

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        ctrl.trigger_shutdown();
        if ctrl.wait_for_drain(drain_timeout).await {
            info!("all in-flight requests drained");
        } else {
            warn!("drain timeout expired with requests still in flight");
        }
        Ok(())
    }
}
