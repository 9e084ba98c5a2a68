//! Command and message handlers.

use crate::bot::access::AccessGate;
use crate::bot::messaging::TelegramDelivery;
use crate::download::{DownloadCoordinator, RequestContext};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};
use tracing::{info, warn};

/// What the bot does, shown on /start.
const HELP_TEXT: &str = "Send me a link to a file (Google Drive, Dropbox, Mediafire, \
a direct URL) or to a video (YouTube, Vimeo, X and similar) and I will fetch it for you.\n\
Large files arrive as zip archives.\n\
Only public content works: no logins, no paywalls.";

// Helper function to get user id from Message
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show what the bot can download
    #[command(description = "Show what the bot can download.")]
    Start,
    /// Present the shared access key
    #[command(description = "Unlock the bot with the shared key.", parse_with = parse_key_args)]
    Key(String),
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
}

/// Accept everything after `/key`, including nothing at all, so a bare
/// `/key` still reaches the handler and gets a usage hint instead of
/// being dropped as unparsable.
fn parse_key_args(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_string(),))
}

/// Start handler - greets and explains what to send
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, access: Arc<AccessGate>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} initiated /start command.");

    let text = if access.enabled() {
        format!("A key is required. Send /key YOUR_KEY first.\n\n{HELP_TEXT}")
    } else {
        HELP_TEXT.to_string()
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Key handler - unlocks the sender's session when the secret matches
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn key(bot: Bot, msg: Message, submitted: String, access: Arc<AccessGate>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);

    if !access.enabled() {
        bot.send_message(msg.chat.id, "This bot is public; no key required.")
            .await?;
        return Ok(());
    }
    if submitted.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /key YOUR_KEY").await?;
        return Ok(());
    }

    if access.unlock(user_id, &submitted).await {
        bot.send_message(msg.chat.id, "Key accepted. You may send links now.")
            .await?;
    } else {
        warn!("User {user_id} presented an invalid key.");
        bot.send_message(msg.chat.id, "Invalid key.").await?;
    }
    Ok(())
}

/// Healthcheck handler - liveness reply
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn healthcheck(bot: Bot, msg: Message) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("Healthcheck command received from user {user_id}.");
    bot.send_message(msg.chat.id, "Bot is running.").await?;
    Ok(())
}

/// Link handler - admission front door for download requests.
///
/// The actual download runs on a spawned task so one slow fetch never
/// stalls this chat's update queue; replies from that point on go
/// through the coordinator's [`TelegramDelivery`].
///
/// # Errors
///
/// Returns an error if an admission-stage reply cannot be sent.
pub async fn handle_link(
    bot: Bot,
    msg: Message,
    coordinator: Arc<DownloadCoordinator>,
    access: Arc<AccessGate>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let url = text.trim().to_string();

    if !access.permits(user_id).await {
        if access.should_notify_denial(user_id).await {
            info!("Keyless link attempt from user {user_id}. Sending key prompt.");
            bot.send_message(msg.chat.id, "This bot requires a key. Use /key YOUR_KEY.")
                .await?;
            access.mark_denial_notified(user_id).await;
        }
        return Ok(());
    }

    let lowered = url.to_lowercase();
    if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
        bot.send_message(msg.chat.id, "Send a valid URL starting with http or https.")
            .await?;
        return Ok(());
    }

    let ctx = RequestContext::new(user_id, url);
    let delivery = TelegramDelivery::new(bot, msg.chat.id);
    tokio::spawn(async move {
        coordinator.handle(ctx, &delivery).await;
    });
    Ok(())
}

/// Document handler - the bot serves links, not inbound uploads
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_document(bot: Bot, msg: Message) -> Result<()> {
    let name = msg
        .document()
        .and_then(|doc| doc.file_name.clone())
        .unwrap_or_else(|| "unnamed file".to_string());
    info!("User {} sent a document: {}", get_user_id_safe(&msg), name);

    bot.send_message(
        msg.chat.id,
        format!("Received Telegram file: {name}. I fetch files from links; send a URL instead."),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_command_accepts_a_bare_invocation() {
        let cmd = Command::parse("/key", "testbot").expect("parse");
        match cmd {
            Command::Key(arg) => assert!(arg.is_empty()),
            _ => panic!("expected the key command"),
        }
    }

    #[test]
    fn test_key_command_trims_the_argument() {
        let cmd = Command::parse("/key  s3cret ", "testbot").expect("parse");
        match cmd {
            Command::Key(arg) => assert_eq!(arg, "s3cret"),
            _ => panic!("expected the key command"),
        }
    }

    #[test]
    fn test_commands_parse_lowercase() {
        assert!(matches!(
            Command::parse("/start", "testbot").expect("parse"),
            Command::Start
        ));
        assert!(matches!(
            Command::parse("/healthcheck@testbot", "testbot").expect("parse"),
            Command::Healthcheck
        ));
    }
}
