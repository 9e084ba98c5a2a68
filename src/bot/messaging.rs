//! Telegram-backed delivery of payloads and status lines.

use crate::download::Delivery;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::InputFile;

/// [`Delivery`] implementation bound to one chat.
pub struct TelegramDelivery {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramDelivery {
    #[must_use]
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .await
            .with_context(|| format!("send message to chat {}", self.chat_id))?;
        Ok(())
    }

    /// Upload under an explicit display name, since transient workspace
    /// paths carry no meaning for the recipient.
    async fn send_file(&self, path: &Path, file_name: &str) -> Result<()> {
        let document = InputFile::file(path.to_path_buf()).file_name(file_name.to_string());
        self.bot
            .send_document(self.chat_id, document)
            .await
            .with_context(|| format!("send document to chat {}", self.chat_id))?;
        Ok(())
    }
}
