//! Operation History Client
//!
//! Queries the wallet's operation history by label. This is how a Quickpay
//! transfer is reconciled: no webhook, the bot polls when the user asks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{PaymentError, Result};

/// Wallet API root
pub const API_BASE: &str = "https://yoomoney.ru/api/";

/// Default timeout for history calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status of a wallet operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Refused,
    InProgress,
    #[serde(other)]
    Unknown,
}

/// Incoming or outgoing transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// A single operation in the history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: String,
    pub status: OperationStatus,
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub label: Option<String>,
}

/// `operation-history` response body
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OperationHistory {
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub next_record: Option<String>,
    /// Set instead of `operations` when the request was rejected
    #[serde(default)]
    pub error: Option<String>,
}

impl OperationHistory {
    /// Parse a response body, turning an `error` field into `PaymentError::Api`
    pub fn from_json(body: &str) -> Result<Self> {
        let history: Self = serde_json::from_str(body)?;
        match history.error {
            Some(code) => Err(PaymentError::Api(code)),
            None => Ok(history),
        }
    }

    /// True if any operation completed successfully
    pub fn has_success(&self) -> bool {
        self.operations
            .iter()
            .any(|op| op.status == OperationStatus::Success)
    }
}

/// Filter for a history request
#[derive(Clone, Debug)]
pub struct HistoryQuery {
    pub label: String,
}

impl HistoryQuery {
    pub fn by_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    fn form(&self) -> [(&'static str, &str); 1] {
        [("label", self.label.as_str())]
    }
}

/// YooMoney wallet API client
pub struct YooMoneyClient {
    http: reqwest::Client,
    token: String,
    api_base: Url,
}

impl YooMoneyClient {
    /// Create a client with the default timeout
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(PaymentError::Config("YooMoney token is empty".into()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token,
            api_base: Url::parse(API_BASE)?,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("PAYMENT_TOKEN")
            .map_err(|_| PaymentError::Config("PAYMENT_TOKEN not set".into()))?;
        Self::new(token)
    }

    /// Point the client at another API root (sandbox, local stub)
    #[must_use]
    pub fn with_api_base(mut self, api_base: Url) -> Self {
        self.api_base = api_base;
        self
    }

    /// Fetch operation history
    pub async fn operation_history(&self, query: &HistoryQuery) -> Result<OperationHistory> {
        let url = self.api_base.join("operation-history")?;

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .form(&query.form())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = %status, "YooMoney rejected history request");
            return Err(PaymentError::Api(format!("HTTP {status}")));
        }

        let history = OperationHistory::from_json(&body)?;
        tracing::debug!(
            operations = history.operations.len(),
            label = %query.label,
            "Fetched operation history"
        );
        Ok(history)
    }
}
