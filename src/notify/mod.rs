//! Notifications
//!
//! Messages are collected in an [`Outbox`] while an operation's transaction
//! is open and handed to the [`NotificationDispatcher`] only after commit.
//! A rolled-back operation therefore never notifies anyone, and a failed
//! delivery never touches committed state.
//!
//! # Flow
//!
//! ```text
//! MarketService ──(commit)──► NotificationDispatcher ──mpsc──► NotificationWorker ──► Notifier
//! ```

pub mod dispatcher;
pub mod telegram;

pub use dispatcher::{NotificationDispatcher, NotificationWorker, notification_channel};
pub use telegram::TelegramNotifier;

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use ulid::Ulid;

use crate::models::Party;

/// Delivery channel for plain-text messages
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name for logging
    fn name(&self) -> &'static str;

    /// Deliver `text` to `handle`; `name` is the recipient's display name.
    /// Returns false when delivery failed. Never panics.
    async fn notify(&self, handle: &str, name: &str, text: &str) -> bool;
}

/// One queued message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Ulid,
    /// Recipient handle; `None` when the party has none (supervisors still get it)
    pub handle: Option<String>,
    pub name: String,
    pub text: String,
}

impl Notification {
    pub fn new(handle: Option<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            handle,
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn for_party(party: &Party, text: impl Into<String>) -> Self {
        Self::new(party.notify_handle.clone(), party.name.clone(), text)
    }
}

/// Messages waiting for the surrounding transaction to commit
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    pub fn notify_party(&mut self, party: &Party, text: impl Into<String>) {
        self.push(Notification::for_party(party, text));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn into_inner(self) -> Vec<Notification> {
        self.pending
    }
}

/// Writes messages to the log instead of delivering them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, handle: &str, name: &str, text: &str) -> bool {
        info!(handle, name, text, "Notification");
        true
    }
}

/// Keeps every message in memory; optionally fails every delivery
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
    }

    /// (handle, name, text) of every successful delivery
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, handle: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(h, _, _)| h == handle)
            .map(|(_, _, text)| text)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, handle: &str, name: &str, text: &str) -> bool {
        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return false;
        }
        match self.sent.lock() {
            Ok(mut sent) => {
                sent.push((handle.to_string(), name.to_string(), text.to_string()));
                true
            }
            Err(_) => false,
        }
    }
}
