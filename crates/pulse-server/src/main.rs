use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use pulse_server::{build_router, AppState};
use shared::{Config, ContentPipeline};

#[derive(Parser)]
#[command(name = "pulse-server")]
#[command(about = "Serve the Latest Pulse content agent over HTTP", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    info!(
        "Model: {}, signals from {}",
        config.model, config.signal_endpoint
    );

    let pipeline = ContentPipeline::from_config(&config)?;
    let app = build_router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("pulse-server listening on http://{}", cli.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("pulse-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warn!("Ctrl-C handler unavailable, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
