//! Outbound side of the chat transport.
//!
//! Handlers talk to `dyn Messenger` so the conversation logic runs the same
//! against Telegram and against the recording fake used in tests.
use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile, MessageId, Recipient};
use teloxide::RequestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("telegram request failed: {0}")]
    Request(#[from] RequestError),
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), DeliveryError>;

    async fn send_photo(
        &self,
        chat: ChatId,
        photo: Url,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), DeliveryError>;

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), DeliveryError>;

    async fn answer_button(&self, query_id: &str) -> Result<(), DeliveryError>;

    async fn notify_admin(&self, text: &str) -> Result<(), DeliveryError>;
}

/// `Messenger` over a live `teloxide::Bot`.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    admin: Recipient,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, admin: Recipient) -> Self {
        Self { bot, admin }
    }
}

impl std::fmt::Debug for TelegramMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramMessenger")
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), DeliveryError> {
        let mut req = self.bot.send_message(chat, text);
        if let Some(kb) = keyboard {
            req = req.reply_markup(kb);
        }
        req.await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo: Url,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), DeliveryError> {
        let mut req = self.bot.send_photo(chat, InputFile::url(photo)).caption(caption);
        if let Some(kb) = keyboard {
            req = req.reply_markup(kb);
        }
        req.await?;
        Ok(())
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), DeliveryError> {
        let mut req = self.bot.edit_message_text(chat, message, text);
        if let Some(kb) = keyboard {
            req = req.reply_markup(kb);
        }
        req.await?;
        Ok(())
    }

    async fn answer_button(&self, query_id: &str) -> Result<(), DeliveryError> {
        self.bot.answer_callback_query(query_id).await?;
        Ok(())
    }

    async fn notify_admin(&self, text: &str) -> Result<(), DeliveryError> {
        self.bot.send_message(self.admin.clone(), text).await?;
        Ok(())
    }
}
