//! Persistent User Ledger
//!
//! Repository interface over user accounts. `SqliteLedger` is the durable
//! implementation; `MemoryLedger` backs tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::account::{PaymentToken, UserAccount, UserId};
use crate::error::{Result, ShopError};

/// How many fresh tokens `ensure_account` tries before giving up
pub const MAX_TOKEN_ATTEMPTS: usize = 5;

/// Produces candidate payment tokens
pub type TokenSource = Arc<dyn Fn() -> PaymentToken + Send + Sync>;

pub(crate) fn random_tokens() -> TokenSource {
    Arc::new(PaymentToken::generate)
}

/// Ledger storage trait
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create an unpaid account with a fresh token if none exists.
    /// Never touches an existing row.
    async fn ensure_account(&self, user_id: UserId) -> Result<()>;

    /// Correlation token, `None` when the user has no account
    async fn get_payment_token(&self, user_id: UserId) -> Result<Option<PaymentToken>>;

    /// Stored paid flag; an unknown user is unpaid
    async fn is_paid(&self, user_id: UserId) -> Result<bool>;

    /// Set the paid flag. Idempotent; unknown users are ignored.
    async fn mark_paid(&self, user_id: UserId) -> Result<()>;

    /// Full account row
    async fn get_account(&self, user_id: UserId) -> Result<Option<UserAccount>>;
}

/// In-memory ledger (for development/testing)
pub struct MemoryLedger {
    accounts: RwLock<HashMap<UserId, UserAccount>>,
    tokens: TokenSource,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            tokens: random_tokens(),
        }
    }

    /// Replace the random token generator
    #[must_use]
    pub fn with_token_source(mut self, tokens: TokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.read().map_or(0, |a| a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a fixed row, bypassing token generation
    pub fn insert(&self, account: UserAccount) -> Result<()> {
        self.accounts
            .write()
            .map_err(|_| poisoned())?
            .insert(account.user_id, account);
        Ok(())
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("ledger lock poisoned".into())
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn ensure_account(&self, user_id: UserId) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        if accounts.contains_key(&user_id) {
            return Ok(());
        }

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = (self.tokens)();
            if accounts.values().any(|a| a.payment_id == token) {
                tracing::warn!(user_id = %user_id, "Payment token collision, regenerating");
                continue;
            }
            accounts.insert(user_id, UserAccount::with_token(user_id, token));
            tracing::info!(user_id = %user_id, "Created account");
            return Ok(());
        }

        Err(ShopError::TokenCollision(MAX_TOKEN_ATTEMPTS))
    }

    async fn get_payment_token(&self, user_id: UserId) -> Result<Option<PaymentToken>> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(&user_id).map(|a| a.payment_id.clone()))
    }

    async fn is_paid(&self, user_id: UserId) -> Result<bool> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(&user_id).is_some_and(|a| a.paid))
    }

    async fn mark_paid(&self, user_id: UserId) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        match accounts.get_mut(&user_id) {
            Some(account) => account.mark_paid(),
            None => tracing::warn!(user_id = %user_id, "mark_paid for unknown user ignored"),
        }
        Ok(())
    }

    async fn get_account(&self, user_id: UserId) -> Result<Option<UserAccount>> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(&user_id).cloned())
    }
}
