use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use video_summary_quiz::config::Config;
use video_summary_quiz::gemini::GeminiClient;
use video_summary_quiz::routes;
use video_summary_quiz::state::AppState;

/// Main entry point for the server
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload folder {}", config.upload_dir.display()))?;

    let model = GeminiClient::new(&config.api_key, &config.model).with_base_url(&config.base_url);
    info!("Gemini client configured, model: {}", config.model);

    let addr = config.bind_addr;
    let app = routes::create_router(AppState::new(config, Arc::new(model)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
