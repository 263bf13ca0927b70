//! Environment Configuration

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use shop_core::sqlite::DEFAULT_DATABASE_PATH;
use shop_core::{ControllerConfig, MenuLinks, ProductOffer};
use shop_payments::DEFAULT_TIMEOUT;

/// Configuration errors, each naming the offending variable
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the bot reads from the environment
#[derive(Clone, Debug)]
pub struct BotConfig {
    /// Telegram bot token
    pub api_token: String,
    pub links: MenuLinks,
    pub offer: ProductOffer,
    /// YooMoney OAuth token for the history API
    pub payment_token: String,
    pub database_path: PathBuf,
    pub content_dir: PathBuf,
    pub provider_timeout: Duration,
}

impl BotConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let links = MenuLinks {
            channel: vars.url("TELEGRAM_CHANNEL_LINK")?,
            free_guide: vars.url("FREE_GUIDE_LINK")?,
            contact: vars.url("CONTACT_LINK")?,
        };

        let amount = vars.parse::<Decimal>("PAYMENT_SUM")?;
        if amount <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                name: "PAYMENT_SUM",
                reason: format!("must be positive, got {amount}"),
            });
        }

        let offer = ProductOffer {
            amount,
            receiver: vars.required("PAYMENT_RECEIVER")?,
            targets: vars.required("PAYMENT_TARGETS")?,
        };

        let provider_timeout = match vars.optional("PROVIDER_TIMEOUT_SECS") {
            Some(_) => Duration::from_secs(vars.parse::<u64>("PROVIDER_TIMEOUT_SECS")?),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_token: vars.required("API_TOKEN")?,
            links,
            offer,
            payment_token: vars.required("PAYMENT_TOKEN")?,
            database_path: vars
                .optional("DATABASE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH), PathBuf::from),
            content_dir: vars
                .optional("CONTENT_DIR")
                .map_or_else(|| PathBuf::from("."), PathBuf::from),
            provider_timeout,
        })
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::new(self.links.clone(), self.offer.clone())
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T>(&self, name: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(name)?;
        raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
    }

    fn url(&self, name: &'static str) -> Result<Url, ConfigError> {
        self.parse(name)
    }
}
