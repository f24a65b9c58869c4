//! Safety-alert relay server
//!
//! Run with: cargo run --example relay_server [BIND_ADDR] [INCIDENT_LOG]
//!
//! Examples:
//!   cargo run --example relay_server                          # 0.0.0.0:8765, ./incidents.jsonl
//!   cargo run --example relay_server localhost                # 127.0.0.1:8765
//!   cargo run --example relay_server 127.0.0.1:9000 /tmp/inc.jsonl
//!
//! ## Field client
//!
//! With websocat:
//!   websocat ws://localhost:8765
//!   {"event":"connect_user","data":{"user_id":"u1"}}
//!   {"event":"audio_chunk","data":{"user_id":"u1","chunk":"AAEC"}}
//!   {"event":"panic","data":{"user_id":"u1","level":"High"}}
//!
//! ## Monitor
//!
//!   websocat ws://localhost:8765
//!   {"event":"connect_admin"}
//!   {"event":"request_listen","data":{"user_id":"u1"}}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alert_relay::incident::JsonLinesIncidentLog;
use alert_relay::server::config::DEFAULT_PORT;
use alert_relay::{RegistryConfig, RelayConfig, RelayServer, ServerConfig};

const DEFAULT_INCIDENT_LOG: &str = "incidents.jsonl";

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8765
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8765
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR] [INCIDENT_LOG]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR     Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
    eprintln!("  INCIDENT_LOG  JSON-lines file for panic/auto-dispatch incidents (default: {})", DEFAULT_INCIDENT_LOG);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default().bind_addr,
    };
    let log_path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_INCIDENT_LOG);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("alert_relay=info".parse()?)
                .add_directive("relay_server=info".parse()?),
        )
        .init();

    let notifier = JsonLinesIncidentLog::open(log_path).await?;
    let server = Arc::new(RelayServer::with_configs(
        ServerConfig::with_addr(bind_addr).idle_timeout(Duration::from_secs(300)),
        RegistryConfig::default(),
        RelayConfig::default(),
        notifier,
    ));

    println!("Starting relay on ws://{}", bind_addr);
    println!("Incidents are appended to {}", log_path);
    println!();

    // Periodic stats
    let stats_server = Arc::clone(&server);
    let stats_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let s = stats_server.state().snapshot().await;
            tracing::info!(
                connections = s.connections_active,
                field_clients = s.field_clients,
                monitors = s.monitors,
                rooms = s.rooms,
                forwarded = s.messages_forwarded,
                dropped = s.messages_dropped,
                incidents = s.incidents_recorded,
                "Relay stats"
            );
        }
    });

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    stats_task.abort();

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
