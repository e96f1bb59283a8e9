//! Presence daemon - tracks who is connected
//!
//! Accepts TCP clients, keeps a registry of their sessions and answers
//! `login`, `ping` and `client_list` requests.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! presenced start
//!
//! # Start the daemon (background/daemonized)
//! presenced start -d
//!
//! # Listen somewhere else
//! presenced start --bind 127.0.0.1:9000
//! PRESENCE_ADDR=127.0.0.1:9000 presenced start
//!
//! # Load settings from a file
//! presenced start --config /etc/presenced.toml
//!
//! # Stop the daemon / check status
//! presenced stop
//! presenced status
//!
//! # Per-request tracing
//! RUST_LOG=presenced=trace presenced start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting, stop the poll loop, exit

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use presenced::{PresenceServer, Registry, ServerConfig};

/// Presence daemon - who is connected right now
#[derive(Parser, Debug)]
#[command(name = "presenced", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,

        /// Address to listen on (overrides config file and PRESENCE_ADDR)
        #[arg(long)]
        bind: Option<String>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("presence")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("presenced.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("presenced.log")
}

fn read_pid() -> Option<u32> {
    let mut file = File::open(pid_file_path()).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

/// Returns the PID of a running daemon, clearing a stale PID file.
fn running_daemon() -> Option<u32> {
    let pid = read_pid()?;
    if is_process_running(pid) {
        return Some(pid);
    }
    remove_pid_file();
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let pid = i32::try_from(pid).context("PID out of range")?;
        // SAFETY: kill(2) has no memory-safety preconditions.
        let result = unsafe { libc::kill(pid, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Start {
        daemon: false,
        bind: None,
        config: None,
    });

    match command {
        Command::Start {
            daemon,
            bind,
            config,
        } => {
            if let Some(pid) = running_daemon() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'presenced stop' to stop it first.");
                process::exit(1);
            }

            let mut config = ServerConfig::load(config.as_deref())?;
            if let Some(addr) = bind {
                config.bind_addr = addr;
            }

            if daemon {
                // Fork before the tokio runtime exists
                daemonize()?;
            }

            write_pid()?;
            let result = run_daemon(config);
            remove_pid_file();
            result
        }
        Command::Stop => {
            let Some(pid) = running_daemon() else {
                println!("Daemon is not running.");
                return Ok(());
            };

            println!("Stopping daemon (PID {pid})...");
            stop_daemon(pid)?;

            for _ in 0..50 {
                if !is_process_running(pid) {
                    println!("Daemon stopped.");
                    return Ok(());
                }
                std::thread::sleep(std::time::Duration::from_millis(100));
            }

            eprintln!("Daemon did not stop within 5 seconds.");
            process::exit(1);
        }
        Command::Status => match running_daemon() {
            Some(pid) => {
                println!("Daemon is running (PID {pid})");
                Ok(())
            }
            None => {
                println!("Daemon is not running.");
                process::exit(1);
            }
        },
    }
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("presenced=info".parse()?)
                .add_directive("presence_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        bind = %config.bind_addr,
        idle_timeout_ms = config.idle_timeout_ms,
        "Presence daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = Registry::new();
    let server = PresenceServer::bind(&config, registry, cancel_token)
        .await
        .context("Failed to start listener")?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Presence daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
