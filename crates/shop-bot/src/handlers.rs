//! Update Handlers
//!
//! Translate Telegram updates into `Inbound` actions for the controller.

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::User;
use teloxide::utils::command::BotCommands;

use shop_core::{ChatId, Controller, Inbound, UserAction, UserId};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "open the main menu")]
    Start,
}

impl Command {
    pub const fn action(&self) -> UserAction {
        match self {
            Self::Start => UserAction::Start,
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn user_id(user: &User) -> UserId {
    UserId(user.id.0 as i64)
}

/// Dispatcher tree: `/start` plus inline button callbacks
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

async fn on_command(msg: Message, cmd: Command, controller: Arc<Controller>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let event = Inbound::new(user_id(user), ChatId(msg.chat.id.0), cmd.action());
    controller.handle(event).await;
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, controller: Arc<Controller>) -> ResponseResult<()> {
    // Stop the client-side spinner before doing any slow work
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        tracing::warn!(error = %err, "Failed to answer callback query");
    }

    let Some(action) = q.data.as_deref().and_then(UserAction::from_callback_data) else {
        tracing::debug!(data = ?q.data, "Ignoring unknown callback");
        return Ok(());
    };

    let user = user_id(&q.from);
    // Private chats share the user's id
    let chat = q
        .message
        .as_ref()
        .map_or(ChatId(user.0), |m| ChatId(m.chat().id.0));

    controller.handle(Inbound::new(user, chat, action)).await;
    Ok(())
}
