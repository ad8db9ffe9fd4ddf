use anyhow::Result;
use std::sync::Arc;

mod config;
mod documents;
mod error;
mod gateway;
mod handlers;
mod models;
mod prompts;
mod rag;
mod redis;
mod repository;
mod repository_traits;
mod speech;
mod transport;

use crate::config::Config;
use crate::gateway::GeminiGateway;
use crate::handlers::AppState;
use crate::redis::RedisManager;
use crate::repository::RedisRepository;
use crate::speech::{RealtimeSink, SpeechController};
use crate::transport::GeminiTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Tracing to stderr so stdout stays clean for process supervisors
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(Config::load());

    let redis_manager = Arc::new(RedisManager::new_with_config(&config).await?);
    let repository = Arc::new(RedisRepository::new(redis_manager));

    let transport = Arc::new(GeminiTransport::new(
        config.gemini.base_url.clone(),
        config.gemini.api_key.clone(),
    ));
    let gateway = Arc::new(GeminiGateway::new(transport, &config.gemini));

    let speech = Arc::new(SpeechController::new(
        gateway.clone(),
        Arc::new(RealtimeSink),
        config.gemini.tts_sample_rate,
    ));

    let state = Arc::new(AppState::new(
        config.clone(),
        gateway,
        repository.clone(),
        repository,
        speech,
    ));
    let router = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        version = %config.server.version,
        "Starting {} HTTP server",
        config.server.name
    );
    axum::serve(listener, router).await?;
    Ok(())
}
