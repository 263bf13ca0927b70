//! Accounts and Payment Tokens
//!
//! One `UserAccount` per chat user, carrying the correlation token that labels
//! the user's transfer on the provider side.

use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};

/// Length of a generated payment token
pub const TOKEN_LEN: usize = 16;

/// External chat-platform user identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat the replies go to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Opaque correlation token (16 alphanumeric characters)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentToken(String);

impl PaymentToken {
    /// Generate a new random token.
    ///
    /// Not checked for uniqueness here; the ledger rejects collisions.
    pub fn generate() -> Self {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Wrap a token loaded from storage
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: UserId,

    /// Assigned once, never regenerated
    pub payment_id: PaymentToken,

    /// Monotonic: false until the provider confirms a transfer
    pub paid: bool,

    pub created_at: DateTime<Utc>,

    /// First confirmation time
    pub paid_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Create an unpaid account with a fresh token
    pub fn new(user_id: UserId) -> Self {
        Self::with_token(user_id, PaymentToken::generate())
    }

    pub fn with_token(user_id: UserId, payment_id: PaymentToken) -> Self {
        Self {
            user_id,
            payment_id,
            paid: false,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    /// Flip to paid. Repeated calls keep the original `paid_at`.
    pub fn mark_paid(&mut self) {
        if !self.paid {
            self.paid = true;
            self.paid_at = Some(Utc::now());
        }
    }
}
