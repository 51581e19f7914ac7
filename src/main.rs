use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use verifyforge::config::{CliArgs, ServiceConfig};
use verifyforge::progress::spawn_progress_sweeper;
use verifyforge::server;
use verifyforge::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Keep the guard alive so buffered file logs are flushed on exit.
    let (file_writer, _log_guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "verifyforge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verifyforge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    info!("Starting verifyforge v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::from_args(args);
    let port = config.port;
    info!("Data dir: {:?}", config.data_dir);

    let state = Arc::new(AppState::new(config)?);
    info!(
        "Engines registered: {:?}",
        state.registry.registered()
    );

    let _sweeper = spawn_progress_sweeper(Arc::clone(&state.progress));

    let router = server::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("VerifyForge listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(
        "VerifyForge shutting down ({} jobs still in flight)",
        state.progress.in_flight()
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
