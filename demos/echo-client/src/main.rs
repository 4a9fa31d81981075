//! Standalone echo client binary exercising `lecnet-tcp`.
//!
//! # Usage
//!
//! ```bash
//! # Development: trust a self-signed server certificate
//! echo-client --address 127.0.0.1 --port 50001 --message "hello" --ca-cert ca.crt
//!
//! # Plain TCP, no TLS
//! echo-client --address 127.0.0.1 --port 50001 --message "hello" --no-tls
//! ```

use std::time::Duration;

use clap::Parser;
use lecnet_tcp::{Client, ClientParams};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// lecnet echo client
#[derive(Parser, Debug)]
#[command(name = "echo-client")]
#[command(about = "Sends one frame to an echo server and prints the reply")]
struct Args {
    /// Server address to connect to
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Server port to connect to
    #[arg(long, default_value = "50001")]
    port: u16,

    /// Payload to send
    #[arg(long, default_value = "hello")]
    message: String,

    /// CA certificate used to verify the server
    #[arg(long, default_value = "ca.crt")]
    ca_cert: String,

    /// Disable TLS entirely
    #[arg(long)]
    no_tls: bool,

    /// Connect timeout, in seconds
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Send/receive timeout, in seconds
    #[arg(long, default_value = "5")]
    send_timeout: u64,

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

    let params = ClientParams {
        address: args.address,
        port: args.port,
        timeout_seconds: args.connect_timeout,
        use_ssl: !args.no_tls,
        ca_cert_path: args.ca_cert.into(),
        magic_number: args.magic,
    };

    let mut client = Client::new(params);
    client.connect().await?;
    tracing::info!("connected");

    let reply = client
        .send_data(args.message.as_bytes(), Duration::from_secs(args.send_timeout), || {})
        .await?;
    tracing::info!(reply = %String::from_utf8_lossy(&reply), "received echo");

    client.disconnect().await;
    tracing::info!(traffic = ?client.traffic(), "disconnected");
    Ok(())
}
