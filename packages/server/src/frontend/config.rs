//! Front-end dispatcher configuration.
//!
//! Scheduling model, stated explicitly: the dispatcher runs entirely as
//! cooperative tokio tasks; the suspension points per request are the
//! admission gate, the outbound fetch, and the back-end framed
//! send/receive. No request blocks a thread.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use pagelens_core::wire::DEFAULT_MAX_FRAME_LEN;

/// Process-wide front-end configuration, fixed at start.
#[derive(Debug, Clone)]
pub struct FrontendConfig {
    /// Listen address. An IPv6 literal selects an IPv6 socket.
    pub host: IpAddr,
    /// Listen port. 0 means OS-assigned.
    pub port: u16,
    /// Admission gate capacity `W`: the maximum number of concurrent
    /// fetch+extract operations.
    pub concurrency_limit: usize,
    /// Back-end address as seen from this process.
    pub backend_host: IpAddr,
    /// Back-end port.
    pub backend_port: u16,
    /// Timeout for one outbound page fetch.
    pub fetch_timeout: Duration,
    /// Overall deadline for one back-end call (connect + send + receive).
    /// A back-end that hangs is treated as a back-end failure, never as a
    /// hung front-end request.
    pub backend_call_timeout: Duration,
    /// Cap on back-end response frame payload length.
    pub max_frame_len: usize,
    /// Maximum time for a whole HTTP request (middleware timeout).
    pub request_timeout: Duration,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
}

impl FrontendConfig {
    /// The back-end address as a socket address.
    #[must_use]
    pub fn backend_addr(&self) -> SocketAddr {
        SocketAddr::new(self.backend_host, self.backend_port)
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            concurrency_limit: 4,
            backend_host: IpAddr::from([127, 0, 0, 1]),
            backend_port: 9000,
            fetch_timeout: Duration::from_secs(30),
            backend_call_timeout: Duration::from_secs(10),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            request_timeout: Duration::from_secs(60),
            cors_origins: vec!["*".to_string()],
        }
    }
}
