//! Back-end processing service binary.
//!
//! ```text
//! pagelens-backend -i ::1 -p 9000 -n 4
//! ```

use std::net::IpAddr;

use clap::Parser;
use pagelens_server::backend::{BackendConfig, BackendModule};
use tracing::info;

/// Processing service: accepts framed requests over TCP and runs the
/// CPU-bound task bodies on a fixed pool of isolated workers.
#[derive(Parser, Debug)]
#[command(name = "pagelens-backend", version, about)]
struct Args {
    /// Listen address (IPv4 or IPv6 literal).
    #[arg(short = 'i', long, env = "PAGELENS_BACKEND_IP")]
    ip: IpAddr,

    /// Listen port.
    #[arg(short = 'p', long, env = "PAGELENS_BACKEND_PORT")]
    port: u16,

    /// Worker pool size (default: available CPU parallelism).
    #[arg(short = 'n', long, env = "PAGELENS_PROCESSES")]
    processes: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = BackendConfig {
        host: args.ip,
        port: args.port,
        pool_size: args.processes.unwrap_or_else(BackendConfig::default_pool_size),
        ..BackendConfig::default()
    };

    let mut module = BackendModule::new(config)?;
    let bound = module.start().await?;
    info!(%bound, "back-end serving");

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
