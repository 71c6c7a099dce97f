//! Back-end service lifecycle with deferred startup.
//!
//! `new()` creates the worker pool and shutdown controller, `start()` binds
//! the TCP listener, and `serve()` accepts connections until the shutdown
//! signal fires, then drains in-flight connections and the pool.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::BackendConfig;
use super::connection::serve_connection;
use super::pool::TaskPool;
use super::task::ProcessingRunner;
use crate::shutdown::ShutdownController;

/// Manages the back-end listener, the worker pool, and graceful teardown.
///
/// The pool is owned here and injected into every connection handler; no
/// global handle exists.
pub struct BackendModule {
    config: BackendConfig,
    listener: Option<TcpListener>,
    pool: Arc<TaskPool<ProcessingRunner>>,
    shutdown: Arc<ShutdownController>,
}

impl BackendModule {
    /// Creates the module and spins up the worker pool without binding any
    /// port.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker threads cannot be spawned.
    pub fn new(config: BackendConfig) -> anyhow::Result<Self> {
        let pool = TaskPool::start(config.pool_size, |_| ProcessingRunner)?;
        info!(workers = pool.size(), "worker pool started");

        Ok(Self {
            config,
            listener: None,
            pool: Arc::new(pool),
            shutdown: Arc::new(ShutdownController::new()),
        })
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Binds the TCP listener to the configured address.
    ///
    /// An IPv6 literal in the configuration yields an IPv6 socket. Returns
    /// the actual bound address, which matters when port 0 requested an
    /// OS-assigned port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let addr = SocketAddr::new(self.config.host, self.config.port);
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;

        info!(%bound, "back-end listener bound");
        self.listener = Some(listener);
        Ok(bound)
    }

    /// Accepts connections until `shutdown` resolves, then drains.
    ///
    /// Each accepted connection is served on its own task so a stalled
    /// client cannot block the others. After the signal: stop accepting,
    /// wait for in-flight connections, then drain the worker pool (every
    /// accepted task finishes).
    ///
    /// # Errors
    ///
    /// Returns an error if pool teardown fails to complete.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let pool = self.pool;
        let ctrl = self.shutdown;
        let config = self.config;

        ctrl.set_ready();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let pool = Arc::clone(&pool);
                            let guard = ctrl.in_flight_guard();
                            let max_frame_len = config.max_frame_len;
                            tokio::spawn(async move {
                                let _guard = guard;
                                serve_connection(stream, peer.to_string(), pool, max_frame_len).await;
                            });
                        }
                        Err(err) => warn!(error = %err, "accept failed"),
                    }
                }
            }
        }

        drop(listener);
        ctrl.trigger_shutdown();
        if !ctrl.wait_for_drain(config.drain_timeout).await {
            warn!("drain timeout expired with connections still in flight");
        }

        // Joining worker threads blocks, so it runs off the async runtime.
        let pool_for_teardown = Arc::clone(&pool);
        tokio::task::spawn_blocking(move || pool_for_teardown.shutdown()).await?;
        info!("worker pool drained");
        Ok(())
    }
}
