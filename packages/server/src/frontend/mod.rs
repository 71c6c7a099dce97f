//! Front-end dispatcher: HTTP surface, admission gate, fetch/extract
//! collaborators, and the back-end wire client.

pub mod backend_client;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::FrontendConfig;
pub use gate::{AdmissionGate, AdmissionSlot};
pub use handlers::AppState;
pub use module::FrontendModule;
