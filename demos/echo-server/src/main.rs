//! Standalone echo server binary exercising `lecnet-tcp`.
//!
//! # Usage
//!
//! ```bash
//! # Development: self-signed certificate
//! echo-server --bind 0.0.0.0 --port 50001
//!
//! # Production: provide a real certificate/key pair
//! echo-server --bind 0.0.0.0 --port 50001 --cert cert.crt --key key.pem
//! ```

use std::sync::Arc;

use clap::Parser;
use lecnet_tcp::{Server, ServerParams, log::LogEvent};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// lecnet echo server
#[derive(Parser, Debug)]
#[command(name = "echo-server")]
#[command(about = "Echoes every frame it receives back to its sender")]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to bind to
    #[arg(long, default_value = "50001")]
    port: u16,

    /// Path to TLS certificate (PEM format)
    #[arg(long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(long)]
    key: Option<String>,

    /// Disable TLS entirely
    #[arg(long)]
    no_tls: bool,

    /// Maximum concurrent clients
    #[arg(long, default_value = "1000")]
    max_clients: usize,

    /// Magic number every frame must carry
    #[arg(long, default_value = "0")]
    magic: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if args.cert.is_none() && !args.no_tls {
        tracing::warn!("No TLS certificate provided - using a self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let params = ServerParams {
        address: args.bind,
        port: args.port,
        max_clients: args.max_clients,
        magic_number: args.magic,
        use_ssl: !args.no_tls,
        cert_path: args.cert.map(Into::into),
        key_path: args.key.map(Into::into),
        ..Default::default()
    };

    let mut server = Server::new(params);
    server
        .start(
            Arc::new(|address, payload| {
                tracing::debug!(%address, bytes = payload.len(), "echoing frame");
                payload.to_vec()
            }),
            Arc::new(|event| match event {
                LogEvent::Started { address } => tracing::info!(%address, "listening"),
                LogEvent::AlreadyRunning => tracing::warn!("server already running"),
                LogEvent::Stopped => tracing::info!("stopped"),
                LogEvent::ClientConnected { address } => tracing::info!(%address, "connected"),
                LogEvent::ClientDenied { address } => tracing::warn!(%address, "denied"),
                LogEvent::ClientDisconnected { address } => tracing::info!(%address, "disconnected"),
                LogEvent::InvalidData { address } => tracing::warn!(%address, "invalid data"),
                LogEvent::Error { message } => tracing::error!(%message, "server error"),
            }),
        )
        .await?;

    tracing::info!(address = %server.local_addr()?, "echo server running");

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}
