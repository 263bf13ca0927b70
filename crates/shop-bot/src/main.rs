//! digital-shop-bot
//!
//! Telegram bot that hands out free content and sells one digital product
//! through YooMoney, releasing the paid file after the transfer is confirmed.

mod config;
mod handlers;
mod telegram;

use std::sync::Arc;

use teloxide::dptree;
use teloxide::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop_core::{Controller, SqliteLedger};
use shop_payments::{YooMoneyClient, YooMoneyProvider};

use crate::config::BotConfig;
use crate::telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment (before tracing so RUST_LOG in .env applies)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,teloxide=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            tracing::error!("  Check API_TOKEN, PAYMENT_* and *_LINK in .env");
            return Err(err.into());
        }
    };

    // Payment ledger
    let ledger = match SqliteLedger::open(&config.database_path) {
        Ok(ledger) => Arc::new(ledger),
        Err(err) => {
            tracing::error!(
                path = %config.database_path.display(),
                error = %err,
                "Failed to open payment ledger"
            );
            return Err(err.into());
        }
    };
    tracing::info!("✓ Ledger ready at {}", config.database_path.display());

    // Payment provider
    let client = YooMoneyClient::with_timeout(config.payment_token.clone(), config.provider_timeout)?;
    let provider = Arc::new(YooMoneyProvider::new(client));
    tracing::info!(
        amount = %config.offer.amount,
        receiver = %config.offer.receiver,
        "✓ YooMoney configured"
    );

    // Telegram transport
    let bot = Bot::new(config.api_token.clone());
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));

    let controller = Arc::new(
        Controller::builder()
            .ledger(ledger.clone())
            .sessions(ledger)
            .provider(provider)
            .messenger(messenger)
            .content_dir(config.content_dir.clone())
            .config(config.controller_config())
            .build()?,
    );

    let assets = controller.config();
    for asset in [&assets.welcome_image, &assets.free_content.path, &assets.paid_content.path] {
        if !config.content_dir.join(asset).exists() {
            tracing::warn!("⚠ {} missing from {}", asset.display(), config.content_dir.display());
        }
    }

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 digital-shop-bot polling for updates");
    tracing::info!("══════════════════════════════════════════════════");

    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("Bot stopped");
    Ok(())
}
