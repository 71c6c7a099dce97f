//! `PageLens` Server — HTTP scrape dispatcher (front-end) and worker-pool
//! processing service (back-end).
//!
//! The two services have deliberately different scheduling models:
//!
//! - the **front-end** is I/O bound and runs as cooperative tokio tasks,
//!   with a counting admission gate bounding concurrent fetch work;
//! - the **back-end** spawns one task per accepted connection and runs the
//!   CPU-bound task bodies on a fixed pool of dedicated OS threads.

pub mod backend;
pub mod frontend;
pub mod shutdown;

pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
