//! Quickpay Checkout Links
//!
//! Builds the hosted YooMoney payment form URL. The label travels with the
//! transfer and shows up again in the operation history.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PaymentError, Result};

/// Hosted payment form endpoint
pub const QUICKPAY_URL: &str = "https://yoomoney.ru/quickpay/confirm.xml";

/// Quickpay form type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickpayForm {
    #[default]
    Shop,
    Small,
    Donate,
}

impl QuickpayForm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shop => "shop",
            Self::Small => "small",
            Self::Donate => "donate",
        }
    }
}

/// How the payer pays
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// YooMoney wallet
    Wallet,
    /// Bank card
    Card,
    /// Mobile phone balance
    Mobile,
    /// Faster Payments System
    #[default]
    Sbp,
}

impl PaymentMethod {
    /// Value of the `paymentType` form field
    pub const fn code(self) -> &'static str {
        match self {
            Self::Wallet => "PC",
            Self::Card => "AC",
            Self::Mobile => "MC",
            Self::Sbp => "SB",
        }
    }
}

/// A checkout form
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quickpay {
    pub receiver: String,
    pub form: QuickpayForm,
    pub targets: String,
    pub payment_type: PaymentMethod,
    pub sum: Decimal,
    pub label: Option<String>,
}

impl Quickpay {
    pub fn new(receiver: impl Into<String>, targets: impl Into<String>, sum: Decimal) -> Self {
        Self {
            receiver: receiver.into(),
            form: QuickpayForm::default(),
            targets: targets.into(),
            payment_type: PaymentMethod::default(),
            sum,
            label: None,
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn form(mut self, form: QuickpayForm) -> Self {
        self.form = form;
        self
    }

    #[must_use]
    pub fn payment_type(mut self, method: PaymentMethod) -> Self {
        self.payment_type = method;
        self
    }

    /// Build the checkout URL. No network call.
    pub fn url(&self) -> Result<Url> {
        if self.receiver.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("receiver is empty".into()));
        }
        if self.sum <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest(format!(
                "sum must be positive, got {}",
                self.sum
            )));
        }

        let sum = self.sum.normalize().to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("receiver", self.receiver.as_str()),
            ("quickpay-form", self.form.as_str()),
            ("targets", self.targets.as_str()),
            ("paymentType", self.payment_type.code()),
            ("sum", sum.as_str()),
        ];
        if let Some(label) = &self.label {
            params.push(("label", label.as_str()));
        }

        Ok(Url::parse_with_params(QUICKPAY_URL, &params)?)
    }
}
