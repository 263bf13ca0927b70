//! User Actions
//!
//! Tagged variants for everything a user can ask the bot to do. Transports
//! translate commands and button callbacks into these at the edge.

use serde::{Deserialize, Serialize};

use crate::account::{ChatId, UserId};

/// A user intent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    /// `/start`: register and show the menu
    Start,
    /// Download the free content file
    FreeContent,
    /// Begin (or repeat) the purchase
    Buy,
    /// Poll the provider for the user's transfer
    ConfirmPayment,
}

impl UserAction {
    /// Callback payload attached to inline buttons
    pub const fn callback_data(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FreeContent => "download_free_content",
            Self::Buy => "buy_product",
            Self::ConfirmPayment => "confirm_payment",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            "start" => Some(Self::Start),
            "download_free_content" => Some(Self::FreeContent),
            "buy_product" => Some(Self::Buy),
            "confirm_payment" => Some(Self::ConfirmPayment),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FreeContent => "free_content",
            Self::Buy => "buy",
            Self::ConfirmPayment => "confirm_payment",
        }
    }
}

impl std::fmt::Display for UserAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound event, already resolved to an action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inbound {
    pub user: UserId,
    pub chat: ChatId,
    pub action: UserAction,
}

impl Inbound {
    pub const fn new(user: UserId, chat: ChatId, action: UserAction) -> Self {
        Self { user, chat, action }
    }
}
