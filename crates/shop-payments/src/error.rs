//! Payment Error Types

use shop_core::ShopError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Transport-level failure talking to the provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with an error code or non-success status
    #[error("YooMoney API error: {0}")]
    Api(String),

    /// Response body did not match the expected shape
    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Checkout parameters rejected before building a link
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    /// Bad endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<PaymentError> for ShopError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Config(msg) => Self::Config(msg),
            other => Self::Provider(other.to_string()),
        }
    }
}
