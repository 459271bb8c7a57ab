use std::sync::Arc;

use anyhow::Context;

use stockroom_api::app::{build_app, services::AppServices};
use stockroom_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tracing first, so configuration warnings are not lost.
    stockroom_observability::init_with(AppConfig::log_format_from_env());
    let config = AppConfig::from_env().context("invalid configuration")?;

    let bind_addr = config.bind_addr;
    let services = Arc::new(AppServices::build(config).await.context("failed to start services")?);
    let app = build_app(services.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    services.shutdown();
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
