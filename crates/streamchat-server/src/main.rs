#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod api;
mod app;
mod config;
mod relay;

use api::RelayState;
use config::{RelayMode, ServerConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load before the logger so RUST_LOG from .env takes effect
    let config = ServerConfig::load().expect("Failed to load server configuration");

    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,streamchat_server=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        mode = ?config.mode,
        model = %config.model,
        "Starting streamchat server"
    );

    let state = Arc::new(RelayState::from_config(&config));
    if state.mode() == RelayMode::Production && !state.has_credential() {
        tracing::warn!("OPENAI_SERCET_KEY is not set; /chat will fail until it is configured");
    }

    let app = app::router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .unwrap_or_else(|err| panic!("Failed to bind to {}: {}", address, err));

    tracing::info!("streamchat running on http://{}", address);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
