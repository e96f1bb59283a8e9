//! Presence client - log in and watch who else is connected
//!
//! # Usage
//!
//! ```bash
//! # Log in as alice and print the client list whenever it changes
//! presence alice
//!
//! # Print the current list once and exit
//! presence alice --once
//!
//! presence alice --addr 10.0.0.5:8001 --ping-ms 1000
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use presence_client::{ClientConfig, PingStatus, PresenceClient};

/// Presence client
#[derive(Parser, Debug)]
#[command(name = "presence", version, about)]
struct Args {
    /// Name to log in with
    name: String,

    /// Server address
    #[arg(long, env = "PRESENCE_ADDR", default_value = "127.0.0.1:8001")]
    addr: String,

    /// Ping interval in milliseconds (keep it below the server's idle timeout)
    #[arg(long, default_value_t = 2000)]
    ping_ms: u64,

    /// Print the client list once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("presence_client=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        addr: args.addr,
        ping_interval: Duration::from_millis(args.ping_ms),
        ..ClientConfig::default()
    };

    let mut client = PresenceClient::connect_with(&config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.addr))?;
    client.login(&args.name).await.context("Login failed")?;
    info!(name = %args.name, addr = %config.addr, "Logged in");

    print_clients(&client.client_list().await?);
    if args.once {
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                ctrl_c_token.cancel();
            }
            // Keep watching; the default SIGINT action still ends the process
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    let mut ticker = tokio::time::interval(config.ping_interval);
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match client.ping().await? {
            PingStatus::Unchanged => debug!("Client list unchanged"),
            PingStatus::ListChanged => print_clients(&client.client_list().await?),
        }
    }

    Ok(())
}

fn print_clients(names: &[String]) {
    let shown: Vec<&str> = names
        .iter()
        .map(|n| if n.is_empty() { "<anonymous>" } else { n.as_str() })
        .collect();
    println!("clients ({}): {}", names.len(), shown.join(", "));
}
