// src/main.rs

use std::time::Duration;

use community_backend::config::Config;
use community_backend::routes;
use community_backend::state::AppState;
use community_backend::storage::Stores;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FOUNDER_DISPLAY_NAME: &str = "Founder";

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Open storage with retry
    let mut retry_count = 0;
    let stores = loop {
        match Stores::connect(&config).await {
            Ok(stores) => break stores,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to open storage after 5 retries: {}", e);
                }
                tracing::warn!("Storage not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Storage ready...");

    let bind_addr = config.bind_addr.clone();
    let founder = config.founder_email.clone().zip(config.founder_password.clone());
    let state = AppState::new(stores, config);

    // Seed Founder Account
    if let Some((email, password)) = founder {
        match state
            .auth
            .seed_founder(&email, &password, FOUNDER_DISPLAY_NAME)
            .await
        {
            Ok(true) => tracing::info!("Founder account created successfully."),
            Ok(false) => tracing::debug!("Founder account already present."),
            Err(e) => tracing::error!("Failed to seed founder account: {:?}", e),
        }
    }

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", bind_addr, e));
    tracing::info!("Listening on {}", bind_addr);

    // Start the server
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
