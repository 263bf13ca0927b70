//! Content Delivery
//!
//! Sends static files from the content directory. Failures are reported to
//! the user and logged; nothing here returns an error to the caller.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::account::ChatId;
use crate::messenger::{Messenger, Reply};

pub const MSG_FILE_NOT_FOUND: &str = "❌ Error: file not found.";
pub const MSG_PAID_FILE_NOT_FOUND: &str = "❌ File not found.";
pub const MSG_FILE_ACCESS: &str = "❌ File access error.";
pub const MSG_SEND_FAILED: &str = "❌ An error occurred while sending the file.";
pub const MSG_LOADING: &str = "🔄 Please wait, file is loading...";

/// A deliverable file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    /// Relative to the content directory
    pub path: PathBuf,
    pub caption: String,
    /// Show a transient "loading" message while uploading
    pub show_loading: bool,
    /// Sent when the file is not on disk
    pub not_found: &'static str,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, caption: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            caption: caption.into(),
            show_loading: false,
            not_found: MSG_FILE_NOT_FOUND,
        }
    }

    #[must_use]
    pub fn with_not_found(mut self, message: &'static str) -> Self {
        self.not_found = message;
        self
    }

    #[must_use]
    pub fn with_loading(mut self) -> Self {
        self.show_loading = true;
        self
    }

    /// Free content handed out from the menu
    pub fn free_content() -> Self {
        Self::new("free_content.docx", "📄 Your free content:")
    }

    /// Gated content, released after payment
    pub fn paid_content() -> Self {
        Self::new("paid_content.pdf", "📄 Your file:")
            .with_loading()
            .with_not_found(MSG_PAID_FILE_NOT_FOUND)
    }
}

/// What happened to a delivery attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Missing,
    AccessDenied,
    Failed,
}

/// Reads files from disk and streams them through the messenger
#[derive(Clone)]
pub struct ContentDelivery {
    messenger: Arc<dyn Messenger>,
    root: PathBuf,
}

impl ContentDelivery {
    pub fn new(messenger: Arc<dyn Messenger>, root: impl Into<PathBuf>) -> Self {
        Self {
            messenger,
            root: root.into(),
        }
    }

    /// Content directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, asset: &Asset) -> PathBuf {
        self.root.join(&asset.path)
    }

    /// Deliver `asset` to `chat`
    pub async fn deliver(&self, chat: ChatId, asset: &Asset) -> DeliveryOutcome {
        let path = self.resolve(asset);

        // Open once up front so missing and unreadable files get distinct messages
        if let Err(e) = tokio::fs::File::open(&path).await {
            let (outcome, message) = match e.kind() {
                ErrorKind::NotFound => (DeliveryOutcome::Missing, asset.not_found),
                ErrorKind::PermissionDenied => (DeliveryOutcome::AccessDenied, MSG_FILE_ACCESS),
                _ => (DeliveryOutcome::Failed, MSG_SEND_FAILED),
            };
            tracing::error!(path = %path.display(), error = %e, "Cannot open content file");
            self.notify(chat, message).await;
            return outcome;
        }

        let loading = if asset.show_loading {
            match self.messenger.send_text(chat, &Reply::text(MSG_LOADING)).await {
                Ok(sent) => Some(sent),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to send loading indicator");
                    None
                }
            }
        } else {
            None
        };

        let outcome = match self.messenger.send_document(chat, &path, &asset.caption).await {
            Ok(_) => {
                tracing::info!(chat = chat.0, path = %path.display(), "Content sent");
                DeliveryOutcome::Delivered
            }
            Err(crate::ShopError::Io(e)) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::error!(path = %path.display(), "File access error");
                self.notify(chat, MSG_FILE_ACCESS).await;
                DeliveryOutcome::AccessDenied
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Error sending document");
                self.notify(chat, MSG_SEND_FAILED).await;
                DeliveryOutcome::Failed
            }
        };

        if let Some(sent) = loading {
            if let Err(e) = self.messenger.delete_message(chat, sent).await {
                tracing::warn!(error = %e, "Failed to clear loading indicator");
            }
        }

        outcome
    }

    async fn notify(&self, chat: ChatId, message: &str) {
        if let Err(e) = self.messenger.send_text(chat, &Reply::text(message)).await {
            tracing::error!(error = %e, "Failed to report delivery problem");
        }
    }
}
