use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use exemplar_backend::core::config::{AppPaths, ConfigService};
use exemplar_backend::core::logging;
use exemplar_backend::server;
use exemplar_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let config = ConfigService::new(paths.clone());
    let settings = config
        .load_settings()
        .context("Failed to load configuration")?;
    logging::init(&paths, &settings.logging.level);

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::initialize(paths, config, settings).await?;

    match state.store.count().await {
        Ok(count) => tracing::info!(
            "Example store ready ({} backend, {} examples)",
            state.store.backend_name(),
            count
        ),
        Err(err) => tracing::warn!("Example store is not answering yet: {}", err),
    }

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
