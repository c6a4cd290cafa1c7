//! wanwatch - reboots an OPNsense appliance when its WAN stays offline
//!
//! Configuration comes from the environment (see `config`); every setting
//! may also be supplied as a file path through `<KEY>_FILE`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wanwatch_agent::config::{self, ProcessEnv};
use wanwatch_agent::{build_watchdog, shutdown, ConnectivityProber, Prober, ShutdownTrigger};

#[derive(Debug, Parser)]
#[command(name = "wanwatch", version, about = "WAN connectivity watchdog for OPNsense")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the watchdog loop (default)
    Run,
    /// Probe internet reachability once and exit (0 = online, 1 = offline)
    Probe,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wanwatch_agent=info,wanwatch=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run().await.map(|()| ExitCode::SUCCESS),
        Command::Probe => probe_once().await,
    }
}

async fn run() -> Result<()> {
    info!("wanwatch v{} starting...", env!("CARGO_PKG_VERSION"));

    config::merge_dotenv();
    let watchdog = build_watchdog(&ProcessEnv)?;

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(forward_signals(trigger));

    watchdog.run(shutdown).await;
    Ok(())
}

/// Exit status: 0 online, 1 offline, 130 interrupted
async fn probe_once() -> Result<ExitCode> {
    let prober = ConnectivityProber::with_defaults().context("Failed to create prober")?;
    let (trigger, mut shutdown) = shutdown::channel();
    tokio::spawn(forward_signals(trigger));

    let Some(verdict) = prober.probe(&mut shutdown).await else {
        warn!("Probe interrupted");
        return Ok(ExitCode::from(130));
    };

    println!("{}", verdict);
    Ok(if verdict.is_online() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Fire the shutdown trigger on SIGINT or SIGTERM
async fn forward_signals(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                    _ = term.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C, shutting down");
    }

    trigger.fire();
}
