//! Bridge binary
//!
//! Run with: gps-bridge [HOST]
//!
//! HOST is the bind host for the WebSocket subscriber side; it defaults to
//! localhost. The TCP ingestion side always listens on 127.0.0.1:9001.

use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gps_bridge::transport::server::DEFAULT_BIND_ADDR;
use gps_bridge::{Bridge, BridgeConfig, TransportConfig};

/// Parse the subscriber-side bind host from the command line argument.
///
/// Accepts "localhost" or a bare IP address; the port is fixed.
fn parse_host(arg: &str) -> Result<IpAddr, String> {
    let normalized = if arg == "localhost" { "127.0.0.1" } else { arg };

    normalized
        .parse::<IpAddr>()
        .map_err(|_| format!("Invalid host: '{}'. Expected an IP address or 'localhost'", arg))
}

fn print_usage() {
    eprintln!("Usage: gps-bridge [HOST]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  HOST    Bind host for the subscriber WebSocket server (default: 127.0.0.1)");
    eprintln!();
    eprintln!("The TCP ingestion socket always listens on 127.0.0.1:9001,");
    eprintln!("one JSON location fix per line.");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let default_addr: SocketAddr = DEFAULT_BIND_ADDR.parse()?;
    let ws_addr = match args.get(1) {
        Some(host) => match parse_host(host) {
            Ok(ip) => SocketAddr::new(ip, default_addr.port()),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => default_addr,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gps_bridge=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let config = BridgeConfig::default().transport(TransportConfig::default().bind(ws_addr));

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            interrupt.cancel();
        }
    });

    Bridge::new(config).run(shutdown).await?;

    Ok(())
}
