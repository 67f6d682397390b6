// Skin check web backend.
//
// Configuration comes from the environment or a `.env` file, see `config.rs`.

use std::sync::Arc;

use anyhow::Context;
use skin_check::{router, AppState, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let state = Arc::new(AppState::from_config(&config).context("could not set up backends")?);

    info!(
        classifier = state.classifier.name(),
        explainer = state.explainer.name(),
        captioning = state.vision.is_some(),
        "Backends ready"
    );

    let app = router(state, config.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("could not bind {}", config.bind_addr))?;

    info!("🚀 Server running on http://{}", config.bind_addr);
    info!("📸 Open in your browser to start a skin check");

    axum::serve(listener, app).await?;
    Ok(())
}
