//! Telegram Messenger
//!
//! `Messenger` over the Bot API. Local files are opened before upload so a
//! missing or unreadable asset surfaces as `ShopError::Io`, not as an opaque
//! request failure.

use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId as TgChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId,
    ParseMode,
};
use teloxide::RequestError;

use shop_core::{Button, ChatId, Keyboard, Messenger, Reply, Result, SentMessage, ShopError, TextFormat};

/// Bot API transport
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

const fn tg_chat(chat: ChatId) -> TgChatId {
    TgChatId(chat.0)
}

#[allow(clippy::needless_pass_by_value)]
fn transport(err: RequestError) -> ShopError {
    ShopError::Transport(err.to_string())
}

const fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Html => Some(ParseMode::Html),
    }
}

async fn ensure_readable(path: &Path) -> Result<()> {
    tokio::fs::File::open(path).await?;
    Ok(())
}

/// Convert a transport-neutral keyboard into inline markup
pub fn inline_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|button| match button {
                Button::Link { text, url } => InlineKeyboardButton::url(text.clone(), url.clone()),
                Button::Action { text, action } => {
                    InlineKeyboardButton::callback(text.clone(), action.callback_data())
                }
            })
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat: ChatId, reply: &Reply) -> Result<SentMessage> {
        let mut request = self.bot.send_message(tg_chat(chat), reply.text.clone());
        if let Some(mode) = parse_mode(reply.format) {
            request = request.parse_mode(mode);
        }
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(inline_keyboard(keyboard));
        }

        let message = request.await.map_err(transport)?;
        Ok(SentMessage(message.id.0))
    }

    async fn send_photo(&self, chat: ChatId, path: &Path, reply: &Reply) -> Result<SentMessage> {
        ensure_readable(path).await?;

        let mut request = self
            .bot
            .send_photo(tg_chat(chat), InputFile::file(path.to_path_buf()))
            .caption(reply.text.clone());
        if let Some(mode) = parse_mode(reply.format) {
            request = request.parse_mode(mode);
        }
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(inline_keyboard(keyboard));
        }

        let message = request.await.map_err(transport)?;
        Ok(SentMessage(message.id.0))
    }

    async fn send_document(&self, chat: ChatId, path: &Path, caption: &str) -> Result<SentMessage> {
        ensure_readable(path).await?;

        let message = self
            .bot
            .send_document(tg_chat(chat), InputFile::file(path.to_path_buf()))
            .caption(caption)
            .await
            .map_err(transport)?;

        tracing::debug!(chat_id = chat.0, path = %path.display(), "Document sent");
        Ok(SentMessage(message.id.0))
    }

    async fn delete_message(&self, chat: ChatId, message: SentMessage) -> Result<()> {
        self.bot
            .delete_message(tg_chat(chat), MessageId(message.0))
            .await
            .map_err(transport)?;
        Ok(())
    }
}
