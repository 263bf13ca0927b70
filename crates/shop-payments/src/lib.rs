//! # shop-payments
//!
//! YooMoney integration for digital-shop-bot.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  Quickpay link  ┌─────────────────┐
//! │     Bot     │────────────────▶│  YooMoney form  │
//! │             │                 │  (label=token)  │
//! │             │◀────────────────│                 │
//! │  "Complete  │  operation-     └─────────────────┘
//! │  Payment"   │  history?label=token
//! └─────────────┘
//! ```
//!
//! The link is built locally; confirmation is a one-shot history query filtered
//! by the user's correlation token. There are no webhooks.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_payments::{YooMoneyClient, YooMoneyProvider};
//!
//! let provider = YooMoneyProvider::new(YooMoneyClient::from_env()?);
//! let url = provider.build_payment_link(&offer.request_for(token))?;
//! // ...later
//! let paid = provider.confirm(&token).await?;
//! ```

mod error;
mod history;
mod provider;
mod quickpay;

pub use error::{PaymentError, Result};
pub use history::{
    Direction, HistoryQuery, Operation, OperationHistory, OperationStatus, YooMoneyClient,
    API_BASE, DEFAULT_TIMEOUT,
};
pub use provider::YooMoneyProvider;
pub use quickpay::{PaymentMethod, Quickpay, QuickpayForm, QUICKPAY_URL};
