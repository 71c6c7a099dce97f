//! Back-end processing service: stream listener, per-connection protocol,
//! and the CPU-bound worker pool.

pub mod config;
pub mod connection;
pub mod module;
pub mod pool;
pub mod task;

pub use config::BackendConfig;
pub use module::BackendModule;
pub use pool::{TaskError, TaskPool, TaskRunner, TaskTicket};
pub use task::ProcessingRunner;
