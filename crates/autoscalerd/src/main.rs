//! autoscalerd — the autoscaler public API daemon.
//!
//! Loads the TOML configuration, opens the state store, wires the scheduler,
//! credential and binding collaborators into the API and serves it until
//! Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! autoscalerd serve --config /etc/autoscaler/api.toml
//! autoscalerd check-config --config /etc/autoscaler/api.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use autoscaler_api::{ApiState, build_router};
use autoscaler_core::Config;
use autoscaler_state::{StateStore, StoredCredentials};
use autoscaler_upstream::{HttpScheduleClient, UpstreamClient};

#[derive(Parser)]
#[command(name = "autoscalerd", about = "Autoscaler public API daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the public API.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: PathBuf,

        /// Override `public_api_server.port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate a configuration file and exit.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, port } => {
            let mut config = load_config(&config)?;
            if let Some(port) = port {
                config.public_api_server.port = port;
            }
            init_tracing(&config)?;
            serve(config).await
        }
        Command::CheckConfig { config } => {
            load_config(&config)?;
            println!("{}: ok", config.display());
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::from_file(path)?;
    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("invalid log level {:?}", config.logging.level))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("autoscaler public API starting");

    let store = StateStore::open(Path::new(&config.db.path))
        .with_context(|| format!("opening state store at {}", config.db.path))?;
    info!(path = %config.db.path, "state store opened");

    let upstream = UpstreamClient::new(config.http_timeout());
    let schedules = HttpScheduleClient::new(&config.scheduler.scheduler_url, upstream);
    let credentials = StoredCredentials::new(store.clone());

    let bindings_enabled = config.binding_store_enabled();
    let port = config.public_api_server.port;
    let config = Arc::new(config);

    let mut state = ApiState::new(
        config.clone(),
        Arc::new(store.clone()),
        Arc::new(schedules),
        Arc::new(credentials),
    );
    if bindings_enabled {
        state = state.with_bindings(Arc::new(store));
        info!("binding store enabled, default policies restored on detach");
    } else {
        info!("build-in mode, no binding store");
    }

    let router = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "public API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("autoscaler public API stopped");
    Ok(())
}
