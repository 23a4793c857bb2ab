mod dispatcher;
mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dispatcher::AppState;
use execd_cache::{Cache, StatsAggregator};
use execd_environment::EnvironmentManager;
use tracing_subscriber::EnvFilter;

/// Remote command execution service: accepts JSON execution requests over
/// HTTP and runs them in sandboxed, optionally named, workspaces.
#[derive(Parser, Debug)]
#[command(name = "execd", about = "Remote command execution service")]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port to bind the HTTP listener to.
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let scratch_root = std::env::temp_dir().join(format!("execd-environments-{}", std::process::id()));
    std::fs::create_dir_all(&scratch_root)?;

    let state = Arc::new(AppState {
        cache: Cache::new(),
        stats: StatsAggregator::new(),
        environments: EnvironmentManager::new(scratch_root),
    });

    let app = dispatcher::router(state);

    let addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "execd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Waits for SIGINT or (on unix) SIGTERM so in-flight requests drain via
/// axum's graceful shutdown instead of being dropped mid-execution.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
