//! mmx daemon (mmxd) - Main entry point
//!
//! Loads bootstrap configuration, brings up the object bus and its
//! subsystems, and runs until Ctrl+C, SIGTERM or a client's Quit command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mmx_common::config::{resolve_config_path, DaemonConfig, CONFIG_ENV_VAR};
use mmx_common::SignalKind;
use mmx_daemon::Daemon;
use tokio::signal;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mmxd
#[derive(Parser, Debug)]
#[command(name = "mmxd")]
#[command(about = "Media daemon object bus")]
#[command(version)]
struct Args {
    /// Bootstrap config file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// IPC endpoint, overrides the config file
    #[arg(short, long, env = "MMX_IPC_SOCKET")]
    ipc_socket: Option<String>,

    /// Output plugin, overrides the config file
    #[arg(short, long)]
    output: Option<String>,

    /// More log output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Less log output
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn default_filter(&self, configured: &str) -> String {
        let level = if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            configured
        };
        format!("mmx_daemon={level},mmxd={level},mmx_common={level}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config comes first so the log level can be taken from it
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config_result = DaemonConfig::load(config_path.as_deref());
    let configured_level = config_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.default_filter(&configured_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = config_result.context("Failed to load configuration")?;
    if let Some(socket) = &args.ipc_socket {
        config.ipc_socket = socket.clone();
    }
    if let Some(output) = &args.output {
        config.output_plugin = output.clone();
    }

    info!("Starting mmxd {}", env!("CARGO_PKG_VERSION"));
    info!("IPC endpoint: {}", config.ipc_socket);
    info!("Output plugin: {}", config.output_plugin);

    let daemon = Daemon::start(&config).context("Failed to start daemon")?;

    let quit = Arc::new(Notify::new());
    let notify = Arc::clone(&quit);
    daemon.main().connect_fn(SignalKind::Quit, move |_, _| notify.notify_one());

    let mut events = daemon.forwarder().subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(
                    "{} {}: {}",
                    event.object,
                    event.event_type(),
                    serde_json::to_string(&event.payload).unwrap_or_default()
                ),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event log lagged, {} events skipped", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        _ = shutdown_signal() => {},
        _ = quit.notified() => {
            info!("Quit requested by client, shutting down");
        },
    }

    daemon.shutdown();
    event_log.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
