//! Demo client: submits one URL to the front-end and prints a summary.
//!
//! ```text
//! pagelens-client https://example.com
//! pagelens-client -i 127.0.0.1 -p 8000 https://example.com
//! ```

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;

/// Test client for the PageLens scrape dispatcher.
#[derive(Parser, Debug)]
#[command(name = "pagelens-client", version, about)]
struct Args {
    /// Front-end address.
    #[arg(short = 'i', long, default_value = "127.0.0.1")]
    ip: IpAddr,

    /// Front-end port.
    #[arg(short = 'p', long, default_value_t = 8000)]
    port: u16,

    /// URL to analyze (e.g. https://example.com).
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let host = match args.ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    };
    let endpoint = format!("http://{host}:{}/scrape", args.port);

    println!("submitting {} to {endpoint}", args.url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;
    let response = client
        .get(&endpoint)
        .query(&[("url", args.url.as_str())])
        .send()
        .await?;

    println!("HTTP status: {}", response.status());
    let data: Value = response.json().await?;

    println!("overall status: {}", data["status"]);

    let scraping = &data["scraping_data"];
    println!("\n=== scraping data ===");
    println!("title: {}", scraping["title"]);
    println!(
        "links: {}",
        scraping["links"].as_array().map_or(0, Vec::len)
    );
    println!("images: {}", scraping["images_count"]);
    println!("structure: {}", scraping["structure"]);

    let processing = &data["processing_data"];
    if processing.is_null() {
        println!("\nno processing data (back-end unavailable)");
        return Ok(());
    }

    println!("\n=== processing data ===");
    let perf = &processing["performance"];
    println!("load time (ms): {}", perf["load_time_ms"]);
    println!("total size (KB): {}", perf["total_size_kb"]);
    println!("requests: {}", perf["num_requests"]);
    println!(
        "thumbnails: {}",
        processing["thumbnails"].as_array().map_or(0, Vec::len)
    );

    if processing["screenshot"].is_string() {
        println!("screenshot received (base64, not printed)");
    }

    Ok(())
}
