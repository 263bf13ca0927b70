//! Payment Provider Strategy Pattern
//!
//! Defines the interface the controller needs from a payment service:
//! build a checkout link tagged with a label, then poll the provider's
//! history for that label.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_core::provider::{PaymentProvider, PaymentRequest};
//!
//! let link = provider.build_payment_link(&request)?;
//! // ...user pays...
//! if provider.confirm(&request.label).await? {
//!     ledger.mark_paid(user).await?;
//! }
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::account::PaymentToken;
use crate::error::Result;

/// Everything needed to build a checkout link
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Fixed product price
    pub amount: Decimal,

    /// Wallet or merchant account receiving the funds
    pub receiver: String,

    /// Payment purpose shown to the payer
    pub targets: String,

    /// Correlation label, later used to find the transfer
    pub label: PaymentToken,
}

/// Product pricing shared by every checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductOffer {
    pub amount: Decimal,
    pub receiver: String,
    pub targets: String,
}

impl ProductOffer {
    /// Bind the offer to one user's token
    pub fn request_for(&self, label: PaymentToken) -> PaymentRequest {
        PaymentRequest {
            amount: self.amount,
            receiver: self.receiver.clone(),
            targets: self.targets.clone(),
            label,
        }
    }
}

/// Payment provider trait (Strategy pattern)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Build a checkout URL. Pure construction, no network call.
    fn build_payment_link(&self, request: &PaymentRequest) -> Result<Url>;

    /// True if any transfer tagged with `label` has completed.
    ///
    /// One-shot; failures propagate to the caller.
    async fn confirm(&self, label: &PaymentToken) -> Result<bool>;

    /// Provider name
    fn name(&self) -> &str;
}
