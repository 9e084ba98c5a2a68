//! Telegram transport: dispatcher wiring, commands and the access gate.

/// Key gate and denial throttling
pub mod access;
/// Command and message handlers
pub mod handlers;
/// Delivery of payloads and status lines
pub mod messaging;

pub use access::AccessGate;

use crate::config::{self, Settings};
use crate::download::{DownloadConfig, DownloadCoordinator};
use handlers::Command;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<Settings>) {
    let coordinator = init_coordinator(&settings);
    let access = init_access_gate(&settings);
    let bot = Bot::new(settings.telegram_token.clone());
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![coordinator, access])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_coordinator(settings: &Settings) -> Arc<DownloadCoordinator> {
    let config = DownloadConfig::from_settings(settings);
    info!(
        "Download limits: {} bytes max, compress over {} bytes, {} concurrent, {} per {}s per user",
        config.max_download_bytes,
        config.compress_threshold_bytes,
        config.max_concurrent_downloads,
        config.rate_limit_quota,
        config.rate_limit_window.as_secs()
    );

    match DownloadCoordinator::new(config) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(e) => {
            error!("Failed to build the HTTP client: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_access_gate(settings: &Settings) -> Arc<AccessGate> {
    let gate = AccessGate::new(
        settings.access_key.clone(),
        config::get_access_session_ttl_secs(),
        config::get_denial_cooldown_secs(),
    );
    if gate.enabled() {
        info!("Access control enabled: a key is required before links are accepted.");
    } else {
        info!("Access control disabled: the bot is public.");
    }
    Arc::new(gate)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().branch(
        Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(
                // Plain text that is not a command; unknown commands stay silent
                Update::filter_message()
                    .filter(|msg: Message| {
                        msg.text().is_some_and(|text| !text.starts_with('/'))
                    })
                    .endpoint(handle_text),
            )
            .branch(
                dptree::filter(|msg: Message| msg.document().is_some())
                    .endpoint(handle_document_message),
            ),
    )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    access: Arc<AccessGate>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg, access).await,
        Command::Key(submitted) => handlers::key(bot, msg, submitted, access).await,
        Command::Healthcheck => handlers::healthcheck(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    coordinator: Arc<DownloadCoordinator>,
    access: Arc<AccessGate>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_link(bot, msg, coordinator, access).await {
        error!("Link handler error: {}", e);
    }
    respond(())
}

async fn handle_document_message(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_document(bot, msg).await {
        error!("Document handler error: {}", e);
    }
    respond(())
}
