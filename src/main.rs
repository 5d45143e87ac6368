#![forbid(unsafe_code)]

//! `node-session` — outbound command session agent binary.
//!
//! Loads configuration, wires the built-in component registry and host
//! collaborators, and keeps a session to the control plane open until
//! ctrl-c or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use node_session::components::agent::AgentComponent;
use node_session::components::{Component, StaticRegistry};
use node_session::dispatch::Collaborators;
use node_session::host::reboot::SystemRebooter;
use node_session::host::systemd::SystemctlProbe;
use node_session::host::StdProcessExit;
use node_session::update::UnavailableUpdater;
use node_session::{AgentConfig, AppError, Result, Session};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "node-session", about = "Node command session agent", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the machine identifier from the configuration file.
    #[arg(long)]
    machine_id: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("node-session bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = AgentConfig::load_from_path(&args.config)?;
    if let Some(machine_id) = args.machine_id {
        if machine_id.trim().is_empty() {
            return Err(AppError::Config("--machine-id must not be empty".into()));
        }
        config.machine_id = machine_id;
    }
    config.load_token();
    let options = config.to_options()?;
    info!(machine_id = %options.machine_id, endpoint = %config.endpoint, "configuration loaded");

    // ── Wire collaborators ──────────────────────────────
    let components: Vec<Arc<dyn Component>> = vec![Arc::new(AgentComponent::new())];
    let collaborators = Collaborators {
        registry: Arc::new(StaticRegistry::new(components)),
        updater: Arc::new(UnavailableUpdater),
        systemd: Arc::new(SystemctlProbe::new()),
        rebooter: Arc::new(SystemRebooter::new()),
        exit: Arc::new(StdProcessExit),
    };

    // ── Start session ───────────────────────────────────
    let ct = CancellationToken::new();
    let session = Session::start(&ct, &config.endpoint, options, collaborators)?;
    info!("session running");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();
    session.stop();

    let generations = session.generation();
    session.join().await;
    info!(generations, "node-session shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
