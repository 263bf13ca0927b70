//! Conversation Controller
//!
//! Drives the purchase state machine:
//!
//! ```text
//!  New ──start──▶ Idle ──buy──▶ AwaitingPayment ──confirm(ok)──▶ Paid
//!                                   │    ▲
//!                                   └────┘ confirm(not yet)
//! ```
//!
//! Every action is handled behind one error boundary: failures are logged and
//! answered with a generic message, and stored state is left as it was so the
//! user can press the same button again.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use crate::account::{ChatId, UserId};
use crate::action::{Inbound, UserAction};
use crate::delivery::{Asset, ContentDelivery, DeliveryOutcome};
use crate::error::{Result, ShopError};
pub use crate::error::{MSG_CONFIRM_ERROR, MSG_REQUEST_ERROR};
use crate::ledger::Ledger;
use crate::messenger::{Button, Keyboard, Messenger, Reply, SentMessage};
use crate::provider::{PaymentProvider, ProductOffer};
use crate::session::{PurchaseState, SessionStore};

pub const MSG_WELCOME: &str = "👋 Welcome!\n\nChoose one of the available options:";
pub const MSG_ALREADY_PAID: &str = "✅ Payment already made. Thank you!";
pub const MSG_CONFIRMED: &str = "✅ Payment successfully confirmed. Thank you!";
pub const MSG_NOT_COMPLETED: &str = "❌ Payment not found or not yet completed.";
pub const MSG_BUY_FIRST: &str = "ℹ️ Press \"Buy Digital Product\" to get a payment link first.";
pub const MSG_CHECK_IN_PROGRESS: &str = "⏳ Your payment is already being checked, please wait.";

/// External links shown in the welcome menu
#[derive(Clone, Debug)]
pub struct MenuLinks {
    pub channel: Url,
    pub free_guide: Url,
    pub contact: Url,
}

/// Static configuration for the controller
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub links: MenuLinks,
    pub offer: ProductOffer,
    /// Currency word used in the price message
    pub currency: String,
    /// Image sent with the welcome menu, relative to the content directory
    pub welcome_image: PathBuf,
    pub free_content: Asset,
    pub paid_content: Asset,
}

impl ControllerConfig {
    pub fn new(links: MenuLinks, offer: ProductOffer) -> Self {
        Self {
            links,
            offer,
            currency: "rubles".into(),
            welcome_image: PathBuf::from("start_image.png"),
            free_content: Asset::free_content(),
            paid_content: Asset::paid_content(),
        }
    }
}

/// Result of handling one action, mostly for logging and tests
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Welcomed,
    ContentSent(DeliveryOutcome),
    LinkIssued(Url),
    AlreadyPaid(DeliveryOutcome),
    Confirmed(DeliveryOutcome),
    NotYetPaid,
    NotAwaitingPayment,
    CheckInProgress,
    Failed,
}

/// Removes the user from the in-flight set when the confirm ends
struct ConfirmGuard<'a> {
    in_flight: &'a Mutex<HashSet<UserId>>,
    user: UserId,
}

impl Drop for ConfirmGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user);
    }
}

/// Event handler set for the bot
pub struct Controller {
    ledger: Arc<dyn Ledger>,
    sessions: Arc<dyn SessionStore>,
    provider: Arc<dyn PaymentProvider>,
    messenger: Arc<dyn Messenger>,
    delivery: ContentDelivery,
    config: ControllerConfig,
    confirming: Mutex<HashSet<UserId>>,
}

impl Controller {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Handle one inbound action. Never fails; errors end up in the log and
    /// as a generic reply.
    pub async fn handle(&self, event: Inbound) -> Outcome {
        tracing::debug!(user_id = %event.user, action = %event.action, "Handling action");

        let result = match event.action {
            UserAction::Start => self.start(event).await,
            UserAction::FreeContent => Ok(Outcome::ContentSent(
                self.delivery.deliver(event.chat, &self.config.free_content).await,
            )),
            UserAction::Buy => self.buy(event).await,
            UserAction::ConfirmPayment => self.confirm(event).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    user_id = %event.user,
                    action = %event.action,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Action failed"
                );
                let message = e.user_message(event.action);
                if let Err(send_err) = self.say(event.chat, Reply::text(message)).await {
                    tracing::error!(user_id = %event.user, error = %send_err, "Failed to report error");
                }
                Outcome::Failed
            }
        }
    }

    async fn start(&self, event: Inbound) -> Result<Outcome> {
        self.ledger.ensure_account(event.user).await?;

        let links = &self.config.links;
        let keyboard = Keyboard::new()
            .row(vec![Button::link("📢 Join Channel", links.channel.clone())])
            .row(vec![
                Button::action("📄 Download Free Content", UserAction::FreeContent),
                Button::link("🌐 Open Content Online", links.free_guide.clone()),
            ])
            .row(vec![Button::link("💬 Contact for Consultation", links.contact.clone())])
            .row(vec![Button::action("📚 Buy Digital Product", UserAction::Buy)]);
        let reply = Reply::text(MSG_WELCOME).with_keyboard(keyboard);

        let image = self.delivery.root().join(&self.config.welcome_image);
        if tokio::fs::metadata(&image).await.is_ok() {
            self.messenger.send_photo(event.chat, &image, &reply).await?;
        } else {
            tracing::warn!(path = %image.display(), "Welcome image missing, sending text menu");
            self.say(event.chat, reply).await?;
        }

        Ok(Outcome::Welcomed)
    }

    async fn buy(&self, event: Inbound) -> Result<Outcome> {
        if self.ledger.is_paid(event.user).await? {
            return self.redeliver(event.chat).await;
        }

        // Users that skipped /start still get an account here
        self.ledger.ensure_account(event.user).await?;
        let token = self
            .ledger
            .get_payment_token(event.user)
            .await?
            .ok_or(ShopError::AccountNotFound(event.user.0))?;

        let offer = &self.config.offer;
        let link = self.provider.build_payment_link(&offer.request_for(token.clone()))?;

        let keyboard = Keyboard::new()
            .row(vec![Button::link("Pay", link.clone())])
            .row(vec![Button::action("Complete Payment", UserAction::ConfirmPayment)]);
        let text = format!(
            "📚 To get the product, please pay <b>{}</b> {}. \nAfter payment, click the <b>Complete Payment</b> button.",
            offer.amount, self.config.currency
        );
        self.say(event.chat, Reply::html(text).with_keyboard(keyboard))
            .await?;

        self.sessions
            .set_state(event.user, PurchaseState::AwaitingPayment)
            .await?;

        tracing::info!(
            user_id = %event.user,
            label = %token,
            provider = self.provider.name(),
            "Payment link issued"
        );
        Ok(Outcome::LinkIssued(link))
    }

    async fn confirm(&self, event: Inbound) -> Result<Outcome> {
        if self.ledger.is_paid(event.user).await? {
            return self.redeliver(event.chat).await;
        }

        if self.sessions.state(event.user).await? != PurchaseState::AwaitingPayment {
            self.say(event.chat, Reply::text(MSG_BUY_FIRST)).await?;
            return Ok(Outcome::NotAwaitingPayment);
        }

        let Some(_guard) = self.begin_confirm(event.user) else {
            tracing::debug!(user_id = %event.user, "Confirm already in flight");
            self.say(event.chat, Reply::text(MSG_CHECK_IN_PROGRESS)).await?;
            return Ok(Outcome::CheckInProgress);
        };

        let token = self
            .ledger
            .get_payment_token(event.user)
            .await?
            .ok_or(ShopError::AccountNotFound(event.user.0))?;

        if !self.provider.confirm(&token).await? {
            tracing::warn!(user_id = %event.user, label = %token, "Payment not confirmed");
            self.say(event.chat, Reply::text(MSG_NOT_COMPLETED)).await?;
            return Ok(Outcome::NotYetPaid);
        }

        self.ledger.mark_paid(event.user).await?;
        self.sessions.set_state(event.user, PurchaseState::Idle).await?;
        tracing::info!(user_id = %event.user, label = %token, "Payment confirmed");

        self.say(event.chat, Reply::text(MSG_CONFIRMED)).await?;
        let delivered = self.delivery.deliver(event.chat, &self.config.paid_content).await;
        Ok(Outcome::Confirmed(delivered))
    }

    async fn redeliver(&self, chat: ChatId) -> Result<Outcome> {
        self.say(chat, Reply::text(MSG_ALREADY_PAID)).await?;
        let delivered = self.delivery.deliver(chat, &self.config.paid_content).await;
        Ok(Outcome::AlreadyPaid(delivered))
    }

    fn begin_confirm(&self, user: UserId) -> Option<ConfirmGuard<'_>> {
        let mut in_flight = self
            .confirming
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_flight.insert(user) {
            Some(ConfirmGuard {
                in_flight: &self.confirming,
                user,
            })
        } else {
            None
        }
    }

    async fn say(&self, chat: ChatId, reply: Reply) -> Result<SentMessage> {
        self.messenger.send_text(chat, &reply).await
    }
}

/// Builder for Controller wiring
#[derive(Default)]
pub struct ControllerBuilder {
    ledger: Option<Arc<dyn Ledger>>,
    sessions: Option<Arc<dyn SessionStore>>,
    provider: Option<Arc<dyn PaymentProvider>>,
    messenger: Option<Arc<dyn Messenger>>,
    content_dir: Option<PathBuf>,
    config: Option<ControllerConfig>,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    #[must_use]
    pub fn content_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.content_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Controller> {
        let ledger = self
            .ledger
            .ok_or_else(|| ShopError::Config("Ledger is required".into()))?;
        let sessions = self
            .sessions
            .ok_or_else(|| ShopError::Config("Session store is required".into()))?;
        let provider = self
            .provider
            .ok_or_else(|| ShopError::Config("Payment provider is required".into()))?;
        let messenger = self
            .messenger
            .ok_or_else(|| ShopError::Config("Messenger is required".into()))?;
        let config = self
            .config
            .ok_or_else(|| ShopError::Config("Controller config is required".into()))?;
        let content_dir = self.content_dir.unwrap_or_else(|| PathBuf::from("."));

        Ok(Controller {
            delivery: ContentDelivery::new(messenger.clone(), content_dir),
            ledger,
            sessions,
            provider,
            messenger,
            config,
            confirming: Mutex::new(HashSet::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{MSG_FILE_NOT_FOUND, MSG_PAID_FILE_NOT_FOUND};
    use crate::messenger::TextFormat;
    use crate::ledger::MemoryLedger;
    use crate::session::MemorySessionStore;
    use crate::testing::{Outbound, RecordingMessenger, Script, ScriptedProvider};
    use rust_decimal_macros::dec;
    use tokio::sync::Notify;

    const USER: UserId = UserId(100);
    const CHAT: ChatId = ChatId(100);

    struct Fixture {
        dir: tempfile::TempDir,
        ledger: Arc<MemoryLedger>,
        sessions: Arc<MemorySessionStore>,
        provider: Arc<ScriptedProvider>,
        messenger: Arc<RecordingMessenger>,
        controller: Arc<Controller>,
    }

    impl Fixture {
        fn new(script: Script) -> Self {
            Self::with_provider(ScriptedProvider::new(script))
        }

        fn with_provider(provider: ScriptedProvider) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("free_content.docx"), b"free").unwrap();
            std::fs::write(dir.path().join("paid_content.pdf"), b"paid").unwrap();

            let ledger = Arc::new(MemoryLedger::new());
            let sessions = Arc::new(MemorySessionStore::new());
            let provider = Arc::new(provider);
            let messenger = Arc::new(RecordingMessenger::new());

            let links = MenuLinks {
                channel: Url::parse("https://t.me/channel").unwrap(),
                free_guide: Url::parse("https://example.com/guide").unwrap(),
                contact: Url::parse("https://t.me/contact").unwrap(),
            };
            let offer = ProductOffer {
                amount: dec!(990),
                receiver: "4100110000000000".into(),
                targets: "Digital product".into(),
            };

            let controller = Controller::builder()
                .ledger(ledger.clone())
                .sessions(sessions.clone())
                .provider(provider.clone())
                .messenger(messenger.clone())
                .content_dir(dir.path())
                .config(ControllerConfig::new(links, offer))
                .build()
                .unwrap();

            Self {
                dir,
                ledger,
                sessions,
                provider,
                messenger,
                controller: Arc::new(controller),
            }
        }

        async fn press(&self, action: UserAction) -> Outcome {
            self.controller.handle(Inbound::new(USER, CHAT, action)).await
        }

        fn paid_path(&self) -> PathBuf {
            self.dir.path().join("paid_content.pdf")
        }
    }

    #[tokio::test]
    async fn test_start_creates_unpaid_account() {
        let fx = Fixture::new(Script::NotPaid);

        assert_eq!(fx.press(UserAction::Start).await, Outcome::Welcomed);

        let account = fx.ledger.get_account(USER).await.unwrap().unwrap();
        assert!(!account.paid);
        assert_eq!(account.payment_id.as_str().len(), 16);

        // No image on disk, so the menu comes as text
        let keyboards = fx.messenger.keyboards();
        assert_eq!(keyboards.len(), 1);
        let actions: Vec<_> = keyboards[0]
            .buttons()
            .filter_map(|b| match b {
                Button::Action { action, .. } => Some(*action),
                Button::Link { .. } => None,
            })
            .collect();
        assert_eq!(actions, vec![UserAction::FreeContent, UserAction::Buy]);
    }

    #[tokio::test]
    async fn test_start_sends_welcome_photo_when_present() {
        let fx = Fixture::new(Script::NotPaid);
        std::fs::write(fx.dir.path().join("start_image.png"), b"png").unwrap();

        fx.press(UserAction::Start).await;

        let sent = fx.messenger.outbound();
        assert!(matches!(
            &sent[0],
            Outbound::Photo { chat: CHAT, path, caption, .. }
                if *path == fx.dir.path().join("start_image.png") && caption == MSG_WELCOME
        ));
    }

    #[tokio::test]
    async fn test_start_twice_keeps_token() {
        let fx = Fixture::new(Script::NotPaid);
        fx.press(UserAction::Start).await;
        let token = fx.ledger.get_payment_token(USER).await.unwrap();

        fx.press(UserAction::Start).await;
        assert_eq!(fx.ledger.get_payment_token(USER).await.unwrap(), token);
        assert_eq!(fx.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_buy_issues_link_with_amount_and_label() {
        let fx = Fixture::new(Script::NotPaid);
        fx.press(UserAction::Start).await;
        let token = fx.ledger.get_payment_token(USER).await.unwrap().unwrap();

        let Outcome::LinkIssued(link) = fx.press(UserAction::Buy).await else {
            panic!("expected a payment link");
        };

        assert!(link.as_str().contains("sum=990"));
        assert!(link.as_str().contains(&format!("label={token}")));
        assert_eq!(
            fx.sessions.state(USER).await.unwrap(),
            PurchaseState::AwaitingPayment
        );

        let sent = fx.messenger.outbound();
        let Some(Outbound::Text { chat, text, format, keyboard }) = sent.last() else {
            panic!("expected the price message");
        };
        assert_eq!(*chat, CHAT);
        assert_eq!(*format, TextFormat::Html);
        assert!(text.contains("<b>990</b>"));
        assert!(keyboard
            .as_ref()
            .is_some_and(|k| k.buttons().any(|b| *b == Button::link("Pay", link.clone()))));
    }

    #[tokio::test]
    async fn test_buy_without_start_creates_account() {
        let fx = Fixture::new(Script::NotPaid);

        assert!(matches!(fx.press(UserAction::Buy).await, Outcome::LinkIssued(_)));
        assert!(fx.ledger.get_account(USER).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_confirm_not_yet_paid() {
        let fx = Fixture::new(Script::NotPaid);
        fx.press(UserAction::Start).await;
        fx.press(UserAction::Buy).await;

        assert_eq!(fx.press(UserAction::ConfirmPayment).await, Outcome::NotYetPaid);

        assert!(!fx.ledger.is_paid(USER).await.unwrap());
        assert_eq!(fx.messenger.texts().last().unwrap(), MSG_NOT_COMPLETED);
        assert_eq!(
            fx.sessions.state(USER).await.unwrap(),
            PurchaseState::AwaitingPayment
        );
        assert!(fx.messenger.documents().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_success_delivers_content() {
        let fx = Fixture::new(Script::NotPaid);
        fx.press(UserAction::Start).await;
        fx.press(UserAction::Buy).await;
        fx.press(UserAction::ConfirmPayment).await;

        fx.provider.set_script(Script::Paid);
        assert_eq!(
            fx.press(UserAction::ConfirmPayment).await,
            Outcome::Confirmed(DeliveryOutcome::Delivered)
        );

        assert!(fx.ledger.is_paid(USER).await.unwrap());
        assert_eq!(fx.sessions.state(USER).await.unwrap(), PurchaseState::Idle);
        assert_eq!(fx.messenger.documents(), vec![fx.paid_path()]);

        let token = fx.ledger.get_payment_token(USER).await.unwrap().unwrap();
        assert!(fx.provider.labels().iter().all(|l| *l == token));
    }

    #[tokio::test]
    async fn test_buy_when_paid_skips_link() {
        let fx = Fixture::new(Script::Paid);
        fx.press(UserAction::Start).await;
        fx.press(UserAction::Buy).await;
        fx.press(UserAction::ConfirmPayment).await;
        let links_before = fx.provider.links_built();
        fx.messenger.clear();

        assert_eq!(
            fx.press(UserAction::Buy).await,
            Outcome::AlreadyPaid(DeliveryOutcome::Delivered)
        );

        assert_eq!(fx.provider.links_built(), links_before);
        assert_eq!(fx.messenger.texts()[0], MSG_ALREADY_PAID);
        assert_eq!(fx.messenger.documents(), vec![fx.paid_path()]);
    }

    #[tokio::test]
    async fn test_confirm_without_buy_skips_provider() {
        let fx = Fixture::new(Script::Paid);
        fx.press(UserAction::Start).await;

        assert_eq!(
            fx.press(UserAction::ConfirmPayment).await,
            Outcome::NotAwaitingPayment
        );
        assert_eq!(fx.provider.confirm_calls(), 0);
        assert!(!fx.ledger.is_paid(USER).await.unwrap());
    }

    #[tokio::test]
    async fn test_provider_failure_is_contained() {
        let fx = Fixture::new(Script::Fail);
        fx.press(UserAction::Start).await;
        fx.press(UserAction::Buy).await;

        assert_eq!(fx.press(UserAction::ConfirmPayment).await, Outcome::Failed);

        assert_eq!(fx.messenger.texts().last().unwrap(), MSG_CONFIRM_ERROR);
        assert!(!fx.ledger.is_paid(USER).await.unwrap());
        assert_eq!(
            fx.sessions.state(USER).await.unwrap(),
            PurchaseState::AwaitingPayment
        );

        // The guard was released, a retry reaches the provider again
        fx.provider.set_script(Script::Paid);
        assert!(matches!(
            fx.press(UserAction::ConfirmPayment).await,
            Outcome::Confirmed(_)
        ));
        assert_eq!(fx.provider.confirm_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_free_content() {
        let fx = Fixture::new(Script::NotPaid);
        std::fs::remove_file(fx.dir.path().join("free_content.docx")).unwrap();

        assert_eq!(
            fx.press(UserAction::FreeContent).await,
            Outcome::ContentSent(DeliveryOutcome::Missing)
        );
        assert_eq!(fx.messenger.texts(), vec![MSG_FILE_NOT_FOUND.to_string()]);
    }

    #[tokio::test]
    async fn test_missing_paid_content_after_confirm() {
        let fx = Fixture::new(Script::Paid);
        std::fs::remove_file(fx.paid_path()).unwrap();
        fx.press(UserAction::Buy).await;

        assert_eq!(
            fx.press(UserAction::ConfirmPayment).await,
            Outcome::Confirmed(DeliveryOutcome::Missing)
        );
        assert_eq!(fx.messenger.texts().last().unwrap(), MSG_PAID_FILE_NOT_FOUND);
        // Payment is still recorded
        assert!(fx.ledger.is_paid(USER).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_confirm_is_skipped() {
        let gate = Arc::new(Notify::new());
        let fx = Fixture::with_provider(ScriptedProvider::gated(Script::Paid, gate.clone()));
        fx.press(UserAction::Buy).await;

        let controller = fx.controller.clone();
        let first = tokio::spawn(async move {
            controller
                .handle(Inbound::new(USER, CHAT, UserAction::ConfirmPayment))
                .await
        });
        while fx.provider.confirm_calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            fx.press(UserAction::ConfirmPayment).await,
            Outcome::CheckInProgress
        );

        gate.notify_one();
        assert_eq!(
            first.await.unwrap(),
            Outcome::Confirmed(DeliveryOutcome::Delivered)
        );
        assert_eq!(fx.provider.confirm_calls(), 1);
        assert_eq!(fx.messenger.documents().len(), 1);
    }

    #[test]
    fn test_builder_requires_services() {
        assert!(matches!(
            Controller::builder().build(),
            Err(ShopError::Config(_))
        ));
    }
}
