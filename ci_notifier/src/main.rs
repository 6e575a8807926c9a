//! CI Notifier — relays Cloud Build completion events into Slack.
//!
//! Cloud Build publishes every build-status change to Pub/Sub. A push
//! subscription delivers them here; interesting builds of the configured repo
//! are announced with links to the artifacts bucket, per-suite test results
//! and commit metadata from GitHub.

mod config;
mod events;
mod metrics;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::NotifierArgs;
use crate::services::notify_service::Outcome;

#[derive(Parser)]
#[command(name = "ci-notifier", about = "Cloud Build → Slack notifier", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the Pub/Sub push endpoint
    Serve {
        /// Server port
        #[arg(short, long, env = "PORT", default_value = "8080")]
        port: u16,

        /// Prometheus exporter port
        #[arg(long, env = "METRICS_PORT", default_value = "9000")]
        metrics_port: u16,

        #[command(flatten)]
        notifier: NotifierArgs,
    },
    /// Run one event through the pipeline and exit
    Replay {
        /// File holding the event; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,

        /// The input is the build resource JSON rather than base64 Pub/Sub data
        #[arg(long)]
        raw_json: bool,

        #[command(flatten)]
        notifier: NotifierArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    match Cli::parse().command {
        Command::Serve {
            port,
            metrics_port,
            notifier,
        } => serve(port, metrics_port, notifier).await,
        Command::Replay {
            file,
            raw_json,
            notifier,
        } => replay(file, raw_json, notifier).await,
    }
}

async fn serve(port: u16, metrics_port: u16, args: NotifierArgs) -> anyhow::Result<()> {
    tracing::info!("Starting CI Notifier...");

    let notifier = args.build_notifier()?;
    // Outer guard; the notifier enforces its own deadline first.
    let request_timeout = Duration::from_secs(args.deadline_secs + 5);

    let state = routes::NotifierState {
        notifier: Arc::new(notifier),
    };
    let app = routes::notifier_app(state, request_timeout);

    metrics::init_metrics(SocketAddr::from(([0, 0, 0, 0], metrics_port)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("CI Notifier listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn replay(file: Option<PathBuf>, raw_json: bool, args: NotifierArgs) -> anyhow::Result<()> {
    let input = match &file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let notifier = args.build_notifier()?;
    let outcome = if raw_json {
        let decoded = events::decode_json(&input)?;
        notifier.handle_event(decoded).await?
    } else {
        notifier.handle(&input).await?
    };

    match outcome {
        Outcome::Delivered => println!("delivered"),
        Outcome::Skipped(reason) => println!("skipped: {reason}"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
