use oauth_sidecar_server::{
    app::{self, AppState},
    config::ServerConfig,
    error::StartupError,
};
use rootcause::prelude::Report;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Report<StartupError>> {
    // Load configuration from environment
    let config = ServerConfig::from_env()
        .map_err(|report| report.context(StartupError::Configuration))?;
    tracing::info!("Loaded configuration");

    let addr = config.listen_addr;

    tracing::info!("Discovering OAuth2 provider...");
    let state = AppState::initialize(config).await?;

    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr,
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
