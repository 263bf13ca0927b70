//! Session Management
//!
//! Explicit per-user purchase state, kept next to the ledger so a restart does
//! not forget who is waiting on a payment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::account::UserId;
use crate::error::{Result, ShopError};

/// Where a user is in the purchase flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    #[default]
    Idle,
    /// A payment link was issued, waiting for the user to confirm
    AwaitingPayment,
}

impl PurchaseState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingPayment => "awaiting_payment",
        }
    }

    /// Unknown tags fall back to idle
    pub fn parse(s: &str) -> Self {
        match s {
            "awaiting_payment" => Self::AwaitingPayment,
            _ => Self::Idle,
        }
    }
}

/// A stored session row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub state: PurchaseState,
    pub updated_at: DateTime<Utc>,
}

/// Session store trait for persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current state; `Idle` when nothing is stored
    async fn state(&self, user_id: UserId) -> Result<PurchaseState>;

    async fn set_state(&self, user_id: UserId, state: PurchaseState) -> Result<()>;
}

/// In-memory session store (for development/testing)
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<UserId, SessionRecord>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn state(&self, user_id: UserId) -> Result<PurchaseState> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ShopError::Storage("session lock poisoned".into()))?;
        Ok(sessions.get(&user_id).map(|s| s.state).unwrap_or_default())
    }

    async fn set_state(&self, user_id: UserId, state: PurchaseState) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ShopError::Storage("session lock poisoned".into()))?;
        sessions.insert(
            user_id,
            SessionRecord {
                user_id,
                state,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}
