//! YooMoney Payment Provider
//!
//! Implementation of `PaymentProvider` on top of Quickpay links and the
//! wallet operation history.

use async_trait::async_trait;
use shop_core::{PaymentProvider, PaymentRequest, PaymentToken, Result};
use url::Url;

use crate::history::{HistoryQuery, YooMoneyClient};
use crate::quickpay::{PaymentMethod, Quickpay, QuickpayForm};

/// YooMoney provider
pub struct YooMoneyProvider {
    client: YooMoneyClient,
    form: QuickpayForm,
    method: PaymentMethod,
}

impl YooMoneyProvider {
    pub fn new(client: YooMoneyClient) -> Self {
        Self {
            client,
            form: QuickpayForm::default(),
            method: PaymentMethod::default(),
        }
    }

    #[must_use]
    pub fn with_form(mut self, form: QuickpayForm) -> Self {
        self.form = form;
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    fn quickpay(&self, request: &PaymentRequest) -> Quickpay {
        Quickpay::new(&request.receiver, &request.targets, request.amount)
            .form(self.form)
            .payment_type(self.method)
            .label(request.label.as_str())
    }
}

#[async_trait]
impl PaymentProvider for YooMoneyProvider {
    fn build_payment_link(&self, request: &PaymentRequest) -> Result<Url> {
        Ok(self.quickpay(request).url()?)
    }

    async fn confirm(&self, label: &PaymentToken) -> Result<bool> {
        let history = self
            .client
            .operation_history(&HistoryQuery::by_label(label.as_str()))
            .await?;
        Ok(history.has_success())
    }

    fn name(&self) -> &str {
        "YooMoney"
    }
}
