//! Hello-world responder used to smoke-test a deployment target.

mod routes;

use std::net::SocketAddr;

use clap::Parser;
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(name = "ci-smoke-server", about = "Platform smoke-test responder")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Cli { port } = Cli::parse();

    let app = routes::smoke_router().layer(TraceLayer::new_for_http());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Smoke server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received SIGINT, shutting down...");
        })
        .await?;
    Ok(())
}
