//! Chat relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:8765
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:8765
//!   cargo run --example relay_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Talking to it
//!
//! With websocat:
//!   websocat ws://localhost:8765
//!   {"message_type":"DECLARATION","data":{"emitter":"Alice"}}
//!   {"message_type":"SEND.TEXT","data":{"emitter":"Alice","receiver":"ALL","value":"hi"}}
//!
//! Declare as `ADMIN` (or any identity starting with it) to watch all traffic.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chat_relay::router::{RelayObserver, RouteOutcome, RoutingRecord};
use chat_relay::server::config::DEFAULT_PORT;
use chat_relay::{ConnectionId, MalformedMessage, RelayServer, ServerConfig, SessionInfo};

/// Observer that logs membership and counts routed messages
#[derive(Default)]
struct LoggingObserver {
    routed: AtomicU64,
    malformed: AtomicU64,
}

impl RelayObserver for LoggingObserver {
    fn on_declared(&self, session: &SessionInfo) {
        println!("[+] {} ({})", session.username, session.role);
    }

    fn on_departed(&self, session: &SessionInfo) {
        println!("[-] {} ({})", session.username, session.role);
    }

    fn on_routed(&self, record: &RoutingRecord, outcome: &RouteOutcome) {
        self.routed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            emitter = %record.emitter,
            receiver = %record.receiver,
            category = %record.message_type,
            outcome = ?outcome,
            "Routed"
        );
    }

    fn on_malformed(&self, connection: ConnectionId, error: &MalformedMessage) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        println!("[!] connection {connection}: {error}");
    }
}

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    // Replace "localhost" with "127.0.0.1"
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{arg}'. Expected format: IP:PORT or IP or 'localhost'"
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{DEFAULT_PORT})");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {e}");
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    println!("Starting chat relay on ws://{}", config.bind_addr);

    let server = Arc::new(RelayServer::with_observer(config, LoggingObserver::default()));

    // Periodic stats
    let stats_server = Arc::clone(&server);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.tick().await;
        loop {
            interval.tick().await;
            let stats = stats_server.router().stats().await;
            let observer = stats_server.router().observer();
            println!(
                "Stats: sessions={} regular={} monitors={} routed={} malformed={} uptime={}s",
                stats.sessions.connections,
                stats.sessions.regular,
                stats.sessions.monitors,
                observer.routed.load(Ordering::Relaxed),
                observer.malformed.load(Ordering::Relaxed),
                stats.uptime.as_secs(),
            );
        }
    });

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
