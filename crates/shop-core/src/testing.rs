//! Test doubles for the transport and provider seams

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use tokio::sync::Notify;
use url::Url;

use crate::account::{ChatId, PaymentToken};
use crate::error::{Result, ShopError};
use crate::messenger::{Keyboard, Messenger, Reply, SentMessage, TextFormat};
use crate::provider::{PaymentProvider, PaymentRequest};

#[derive(Clone, Debug)]
pub enum Outbound {
    Text {
        chat: ChatId,
        text: String,
        format: TextFormat,
        keyboard: Option<Keyboard>,
    },
    Photo {
        chat: ChatId,
        path: PathBuf,
        caption: String,
        keyboard: Option<Keyboard>,
    },
    Document {
        chat: ChatId,
        path: PathBuf,
        caption: String,
    },
    Deleted {
        chat: ChatId,
        message: SentMessage,
    },
}

/// Messenger that records everything it is asked to send
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Outbound>>,
    next_id: AtomicI32,
    fail_documents: AtomicBool,
    deny_documents: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_documents(&self) {
        self.fail_documents.store(true, Ordering::SeqCst);
    }

    /// Uploads fail as if the file became unreadable after the open check
    pub fn deny_documents(&self) {
        self.deny_documents.store(true, Ordering::SeqCst);
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<PathBuf> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Document { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn keyboards(&self) -> Vec<Keyboard> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text { keyboard, .. } | Outbound::Photo { keyboard, .. } => keyboard,
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn push(&self, item: Outbound) -> SentMessage {
        self.sent.lock().unwrap().push(item);
        SentMessage(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat: ChatId, reply: &Reply) -> Result<SentMessage> {
        Ok(self.push(Outbound::Text {
            chat,
            text: reply.text.clone(),
            format: reply.format,
            keyboard: reply.keyboard.clone(),
        }))
    }

    async fn send_photo(&self, chat: ChatId, path: &Path, reply: &Reply) -> Result<SentMessage> {
        Ok(self.push(Outbound::Photo {
            chat,
            path: path.to_path_buf(),
            caption: reply.text.clone(),
            keyboard: reply.keyboard.clone(),
        }))
    }

    async fn send_document(&self, chat: ChatId, path: &Path, caption: &str) -> Result<SentMessage> {
        if self.deny_documents.load(Ordering::SeqCst) {
            return Err(ShopError::Io(std::io::Error::from(
                std::io::ErrorKind::PermissionDenied,
            )));
        }
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(ShopError::Transport("upload rejected".into()));
        }
        Ok(self.push(Outbound::Document {
            chat,
            path: path.to_path_buf(),
            caption: caption.to_string(),
        }))
    }

    async fn delete_message(&self, chat: ChatId, message: SentMessage) -> Result<()> {
        self.push(Outbound::Deleted { chat, message });
        Ok(())
    }
}

/// What the scripted provider answers to `confirm`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Script {
    Paid,
    NotPaid,
    Fail,
}

/// Provider with a fixed answer and call counters
pub struct ScriptedProvider {
    script: Mutex<Script>,
    confirm_calls: AtomicUsize,
    links_built: AtomicUsize,
    labels: Mutex<Vec<PaymentToken>>,
    gate: Option<std::sync::Arc<Notify>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            confirm_calls: AtomicUsize::new(0),
            links_built: AtomicUsize::new(0),
            labels: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// `confirm` waits for the gate before answering
    pub fn gated(script: Script, gate: std::sync::Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(script)
        }
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn links_built(&self) -> usize {
        self.links_built.load(Ordering::SeqCst)
    }

    pub fn labels(&self) -> Vec<PaymentToken> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    fn build_payment_link(&self, request: &PaymentRequest) -> Result<Url> {
        self.links_built.fetch_add(1, Ordering::SeqCst);
        Url::parse(&format!(
            "https://pay.example/checkout?sum={}&label={}",
            request.amount, request.label
        ))
        .map_err(|e| ShopError::Provider(e.to_string()))
    }

    async fn confirm(&self, label: &PaymentToken) -> Result<bool> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.labels.lock().unwrap().push(label.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let script = *self.script.lock().unwrap();
        match script {
            Script::Paid => Ok(true),
            Script::NotPaid => Ok(false),
            Script::Fail => Err(ShopError::Provider("connection reset".into())),
        }
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}
