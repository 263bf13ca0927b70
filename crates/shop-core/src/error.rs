//! Error Types

use thiserror::Error;

use crate::action::UserAction;

pub const MSG_REQUEST_ERROR: &str = "❌ An error occurred while processing your request.";
pub const MSG_CONFIRM_ERROR: &str = "❌ An error occurred while checking the payment. Please try again.";
pub const MSG_START_FIRST: &str = "❌ Please send /start first.";

/// Result type alias for shop operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Shop error types
#[derive(Error, Debug)]
pub enum ShopError {
    /// Ledger or session storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payment provider call failed
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Chat transport rejected a request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Could not allocate a unique payment token
    #[error("Payment token collision after {0} attempts")]
    TokenCollision(usize),

    /// No account row for the user
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShopError {
    /// Check if the user can simply press the button again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::Storage(_) | Self::Transport(_) | Self::Io(_)
        )
    }

    /// Generic reply for a failed `action`. Never carries error details.
    pub const fn user_message(&self, action: UserAction) -> &'static str {
        match (self, action) {
            (Self::AccountNotFound(_), _) => MSG_START_FIRST,
            (_, UserAction::ConfirmPayment) => MSG_CONFIRM_ERROR,
            _ => MSG_REQUEST_ERROR,
        }
    }
}

impl From<r2d2::Error> for ShopError {
    fn from(err: r2d2::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for ShopError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
