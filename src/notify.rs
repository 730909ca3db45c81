//! Snapshot notifications.
//!
//! The reconciler pushes snapshots through a [`NotificationSink`]. The
//! provided [`NotificationHub`] fans each snapshot out to every connected
//! subscriber over its own bounded channel; a slow subscriber loses messages
//! instead of stalling the tick, and closed subscribers are dropped on the
//! next publish.

use crate::models::Snapshot;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

pub trait NotificationSink: Send + Sync {
    fn publish(&self, snapshot: &Snapshot);
}

/// Who is connecting. Anonymous subscribers only get change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscriber {
    Anonymous,
    User(String),
}

impl Subscriber {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Subscriber::User(_))
    }
}

/// Receiving end of a hub subscription.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Snapshot>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next snapshot; `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }
}

pub struct NotificationHub {
    subscribers: DashMap<Uuid, mpsc::Sender<Snapshot>>,
    buffer: usize,
}

impl NotificationHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber. Authenticated subscribers immediately receive
    /// `current()`; it is not evaluated for anonymous ones.
    pub fn subscribe(&self, who: &Subscriber, current: impl FnOnce() -> Option<Snapshot>) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();

        if who.is_authenticated() {
            if let Some(snapshot) = current() {
                // Fresh channel with capacity >= 1 cannot be full.
                let _ = tx.try_send(snapshot);
            }
        }

        self.subscribers.insert(id, tx);
        debug!(subscriber = %id, authenticated = who.is_authenticated(), "Subscriber connected");

        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl NotificationSink for NotificationHub {
    fn publish(&self, snapshot: &Snapshot) {
        self.subscribers.retain(|id, tx| match tx.try_send(*snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = %id, "Subscriber is lagging, dropping notification");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = %id, "Subscriber disconnected");
                false
            }
        });
    }
}
