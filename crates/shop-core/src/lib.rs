//! # shop-core
//!
//! Purchase state machine and payment ledger for a single-product chat shop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Controller                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │    Ledger    │  │   Session    │  │  PaymentProvider   │  │
//! │  │ (accounts +  │  │    Store     │  │    (Strategy)      │  │
//! │  │   tokens)    │  │              │  │                    │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! │          │                                                    │
//! │          ▼                                                    │
//! │  ┌──────────────┐       ┌──────────────────┐                 │
//! │  │   Content    │──────▶│    Messenger     │ (chat transport)│
//! │  │   Delivery   │       └──────────────────┘                 │
//! │  └──────────────┘                                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All services are injected as trait objects, so tests swap in
//! `MemoryLedger`, `MemorySessionStore` and recording fakes.

pub mod account;
pub mod action;
pub mod controller;
pub mod delivery;
pub mod error;
pub mod ledger;
pub mod messenger;
pub mod provider;
pub mod session;
pub mod sqlite;

#[cfg(test)]
mod testing;

pub use account::{ChatId, PaymentToken, UserAccount, UserId};
pub use action::{Inbound, UserAction};
pub use controller::{Controller, ControllerBuilder, ControllerConfig, MenuLinks, Outcome};
pub use delivery::{Asset, ContentDelivery, DeliveryOutcome};
pub use error::{Result, ShopError};
pub use ledger::{Ledger, MemoryLedger, TokenSource, MAX_TOKEN_ATTEMPTS};
pub use messenger::{Button, Keyboard, Messenger, Reply, SentMessage, TextFormat};
pub use provider::{PaymentProvider, PaymentRequest, ProductOffer};
pub use session::{MemorySessionStore, PurchaseState, SessionStore};
pub use sqlite::SqliteLedger;
