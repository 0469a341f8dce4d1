use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crudapp_types::TxSignature;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// User-facing feedback for one finished mutation.
///
/// `payload` is the transaction signature on success and the error message
/// on failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub payload: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn success(signature: &TxSignature) -> Self {
        Self {
            kind: NotificationKind::Success,
            payload: signature.to_base58(),
            at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            payload: message.into(),
            at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NotificationKind::Success
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NotificationKind::Success => write!(f, "transaction {}", self.payload),
            NotificationKind::Error => f.write_str(&self.payload),
        }
    }
}

/// Receives success and error signals for user feedback.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Emits notifications as tracing events.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => info!(signature = %notification.payload, "transaction confirmed"),
            NotificationKind::Error => warn!(error = %notification.payload, "mutation failed"),
        }
    }
}

/// Keeps every notification in memory.
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|n| n.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Remove and return everything received so far.
    pub fn take(&self) -> Vec<Notification> {
        match self.received.lock() {
            Ok(mut n) => std::mem::take(&mut *n),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: Notification) {
        match self.received.lock() {
            Ok(mut n) => n.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn notify(&self, _notification: Notification) {}
}
