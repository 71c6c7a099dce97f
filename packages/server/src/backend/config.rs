//! Back-end service configuration.
//!
//! Scheduling model, stated explicitly: the listener accepts on the tokio
//! runtime and spawns one task per connection; each connection waits on a
//! pool future while the CPU-bound task bodies run on the pool's dedicated
//! OS threads.

use std::net::IpAddr;
use std::time::Duration;

use pagelens_core::wire::DEFAULT_MAX_FRAME_LEN;

/// Process-wide back-end configuration, fixed at start.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Listen address. An IPv6 literal selects an IPv6 socket.
    pub host: IpAddr,
    /// Listen port. 0 means OS-assigned.
    pub port: u16,
    /// Worker pool size `N`. Defaults to the available CPU parallelism.
    pub pool_size: usize,
    /// Cap on inbound frame payload length.
    pub max_frame_len: usize,
    /// How long shutdown waits for in-flight connections before giving up.
    pub drain_timeout: Duration,
}

impl BackendConfig {
    /// Available CPU parallelism, falling back to 4 when it cannot be
    /// queried.
    #[must_use]
    pub fn default_pool_size() -> usize {
        std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            pool_size: Self::default_pool_size(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            drain_timeout: Duration::from_secs(30),
        }
    }
}
