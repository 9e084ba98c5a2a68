use dotenvy::dotenv;
use linkfetch_bot::bot::run_bot;
use linkfetch_bot::config::Settings;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting linkfetch bot...");

    let settings = init_settings();

    run_bot(settings).await;
}

fn init_logging() {
    // DEBUG_MODE=true opens the floodgates for everything
    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("linkfetch_bot=info,teloxide=warn,hyper=warn,reqwest=warn")
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn init_settings() -> Arc<Settings> {
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if settings.telegram_token.trim().is_empty() {
        error!("telegram_token is missing. Set TELEGRAM_TOKEN before starting.");
        std::process::exit(1);
    }

    info!("Configuration loaded successfully.");
    Arc::new(settings)
}
