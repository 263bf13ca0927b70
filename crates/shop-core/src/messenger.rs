//! Chat Transport Boundary
//!
//! The controller speaks to users only through `Messenger`. The Telegram
//! implementation lives in the bot binary; tests use a recording fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::account::ChatId;
use crate::action::UserAction;
use crate::error::Result;

/// How reply text should be interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}

/// Inline keyboard button
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Button {
    /// Opens an external link
    Link { text: String, url: Url },
    /// Sends an action back to the bot
    Action { text: String, action: UserAction },
}

impl Button {
    pub fn link(text: impl Into<String>, url: Url) -> Self {
        Self::Link {
            text: text.into(),
            url,
        }
    }

    pub fn action(text: impl Into<String>, action: UserAction) -> Self {
        Self::Action {
            text: text.into(),
            action,
        }
    }
}

/// Rows of inline buttons
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Outbound message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub format: TextFormat,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Html,
            keyboard: None,
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Handle to a sent message, used to delete it later
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage(pub i32);

/// Chat transport trait
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat: ChatId, reply: &Reply) -> Result<SentMessage>;

    /// Send a local image with the reply as caption
    async fn send_photo(&self, chat: ChatId, path: &Path, reply: &Reply) -> Result<SentMessage>;

    /// Stream a local file as a document
    async fn send_document(&self, chat: ChatId, path: &Path, caption: &str) -> Result<SentMessage>;

    async fn delete_message(&self, chat: ChatId, message: SentMessage) -> Result<()>;
}
