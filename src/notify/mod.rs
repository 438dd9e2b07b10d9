//! Notification channel between the request pipeline and the display surface.
//!
//! Publishers hold a cloned [`NotificationChannel`]. At most one subscriber
//! is registered at a time; the latest `subscribe` replaces any earlier one.
//! With no subscriber, `publish` drops the event and logs it. Nothing is
//! buffered for a surface that mounts later.

pub mod toast;

pub use toast::ToastStack;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Monotonically increasing per channel.
    pub id: u64,
    pub severity: Severity,
    pub message: String,
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

struct ChannelInner {
    next_event_id: AtomicU64,
    next_subscriber_id: AtomicU64,
    subscriber: Mutex<Option<Subscriber>>,
}

impl ChannelInner {
    fn lock_subscriber(&self) -> MutexGuard<'_, Option<Subscriber>> {
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unregister(&self, subscriber_id: u64) {
        let mut current = self.lock_subscriber();
        if current.as_ref().is_some_and(|s| s.id == subscriber_id) {
            *current = None;
            log::debug!("Notification subscriber {} unregistered", subscriber_id);
        }
    }
}

#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<ChannelInner>,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                next_event_id: AtomicU64::new(1),
                next_subscriber_id: AtomicU64::new(1),
                subscriber: Mutex::new(None),
            }),
        }
    }

    /// Deliver an event to the mounted subscriber.
    ///
    /// Returns the assigned event id, or `None` if the event was dropped.
    pub fn publish(&self, severity: Severity, message: impl Into<String>) -> Option<u64> {
        let message = message.into();
        let mut current = self.inner.lock_subscriber();
        let Some(subscriber) = current.as_ref() else {
            log::warn!(
                "Notification dropped, no display surface mounted ({}): {}",
                severity.label(),
                message
            );
            return None;
        };

        let id = self.inner.next_event_id.fetch_add(1, Ordering::SeqCst);
        let event = NotificationEvent {
            id,
            severity,
            message,
        };
        match subscriber.tx.send(event) {
            Ok(()) => Some(id),
            Err(mpsc::error::SendError(event)) => {
                log::warn!(
                    "Notification dropped, display surface went away ({}): {}",
                    event.severity.label(),
                    event.message
                );
                *current = None;
                None
            }
        }
    }

    /// Register as the single active subscriber, replacing any previous one.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self.inner.lock_subscriber().replace(Subscriber { id, tx });
        if let Some(previous) = previous {
            log::debug!(
                "Notification subscriber {} replaced by {}",
                previous.id,
                id
            );
        }
        Subscription {
            id,
            rx,
            channel: Arc::downgrade(&self.inner),
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.inner.lock_subscriber().is_some()
    }
}

/// Receiving end of a registration. Unregisters on drop.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<NotificationEvent>,
    channel: Weak<ChannelInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. `None` once replaced by a newer subscriber
    /// and every delivered event has been read.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<NotificationEvent> {
        self.rx.try_recv().ok()
    }

    /// Unregister without dropping the receiver, so delivered events can
    /// still be drained.
    pub fn unsubscribe(&self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unregister(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
