//! Front-end dispatcher binary.
//!
//! ```text
//! pagelens-frontend -i :: -p 8000 -w 4 --backend-ip ::1 --backend-port 9000
//! ```

use std::net::IpAddr;

use clap::Parser;
use pagelens_server::frontend::{FrontendConfig, FrontendModule};
use tracing::info;

/// Scrape dispatcher: accepts HTTP scrape requests, fetches and extracts
/// pages under a bounded concurrency limit, and consults the back-end
/// processing service.
#[derive(Parser, Debug)]
#[command(name = "pagelens-frontend", version, about)]
struct Args {
    /// Listen address (IPv4 or IPv6 literal, e.g. 0.0.0.0 or ::).
    #[arg(short = 'i', long, env = "PAGELENS_FRONTEND_IP")]
    ip: IpAddr,

    /// Listen port.
    #[arg(short = 'p', long, env = "PAGELENS_FRONTEND_PORT")]
    port: u16,

    /// Maximum concurrent fetch+extract operations (admission gate
    /// capacity).
    #[arg(short = 'w', long, env = "PAGELENS_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Back-end processing service address.
    #[arg(long, env = "PAGELENS_BACKEND_IP", default_value = "127.0.0.1")]
    backend_ip: IpAddr,

    /// Back-end processing service port.
    #[arg(long, env = "PAGELENS_BACKEND_PORT", default_value_t = 9000)]
    backend_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = FrontendConfig {
        host: args.ip,
        port: args.port,
        concurrency_limit: args.workers,
        backend_host: args.backend_ip,
        backend_port: args.backend_port,
        ..FrontendConfig::default()
    };

    let mut module = FrontendModule::new(config)?;
    let bound = module.start().await?;
    info!(%bound, workers = args.workers, "front-end serving");

    module.serve(shutdown_signal()).await
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
