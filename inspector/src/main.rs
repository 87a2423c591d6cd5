mod listing;

use clap::Parser;
use remo_collector::config::{DEFAULT_DEVICE_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS};
use remo_collector::remo::{fetch_devices, HttpSession};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// List every Nature Remo device with its latest sensor values
#[derive(Parser, Debug)]
#[command(name = "remo-inspector")]
struct Args {
    #[arg(long, env = "NATURE_REMO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "NATURE_REMO_ENDPOINT", default_value = DEFAULT_DEVICE_ENDPOINT)]
    endpoint: String,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let api_key = match args.api_key.as_deref() {
        Some(key) if !key.is_empty() && key != PLACEHOLDER_API_KEY => key.to_string(),
        _ => {
            error!("Set NATURE_REMO_API_KEY in the environment or .env");
            std::process::exit(1);
        }
    };

    let session = match HttpSession::new(Duration::from_secs(args.timeout_secs)) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let devices = match fetch_devices(&api_key, &args.endpoint, &session).await {
        Ok(devices) => devices,
        Err(e) => {
            error!("Device API request failed: {}", e);
            std::process::exit(1);
        }
    };

    if devices.is_empty() {
        println!("No devices found");
        return;
    }

    println!("=== Nature Remo devices ===\n");
    for device in &devices {
        println!("{}", listing::describe(device));
    }
}
