//! Bounded mailboxes between the protocol legs and the dispatcher.
//!
//! Sends never wait: when a mailbox is full the message is dropped, a
//! warning is logged and the drop counter is bumped. The one exception is
//! [`MailboxSender::deliver_within`], used for the reply that must be queued
//! before the process exits. Receivers are owned by a
//! single consumer at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::models::body::Body;

/// Capacity of each session mailbox.
pub const MAILBOX_CAPACITY: usize = 20;

/// Outcome of a non-blocking send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Message queued.
    Delivered,
    /// Mailbox full; message discarded.
    Dropped,
    /// Receiver gone; the session is shutting down.
    Closed,
}

/// Sending half of a mailbox with drop-on-full semantics.
#[derive(Debug, Clone)]
pub struct MailboxSender {
    name: &'static str,
    tx: mpsc::Sender<Body>,
    dropped: Arc<AtomicU64>,
}

/// Create a mailbox named `name` holding at most `capacity` messages.
#[must_use]
pub fn mailbox(name: &'static str, capacity: usize) -> (MailboxSender, mpsc::Receiver<Body>) {
    let (tx, rx) = mpsc::channel(capacity);
    let sender = MailboxSender {
        name,
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

impl MailboxSender {
    /// Queue `body` without waiting.
    pub fn try_deliver(&self, body: Body) -> Delivery {
        match self.tx.try_send(body) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(body)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    mailbox = self.name,
                    req_id = body.req_id,
                    dropped_total = total,
                    "mailbox full, dropping message"
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(body)) => {
                debug!(
                    mailbox = self.name,
                    req_id = body.req_id,
                    "mailbox closed, discarding message"
                );
                Delivery::Closed
            }
        }
    }

    /// Queue `body`, waiting at most `wait` for room.
    ///
    /// Used where the caller must not proceed until the message is queued.
    /// A message still unqueued after `wait` counts as dropped.
    pub async fn deliver_within(&self, body: Body, wait: Duration) -> Delivery {
        let req_id = body.req_id.clone();
        match tokio::time::timeout(wait, self.tx.send(body)).await {
            Ok(Ok(())) => Delivery::Delivered,
            Ok(Err(_)) => {
                debug!(mailbox = self.name, req_id, "mailbox closed, discarding message");
                Delivery::Closed
            }
            Err(_) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    mailbox = self.name,
                    req_id,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    dropped_total = total,
                    "mailbox still full after waiting, dropping message"
                );
                Delivery::Dropped
            }
        }
    }

    /// Messages dropped because the mailbox was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Messages currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Shared drop counter, readable after the sender moves into a task.
    pub(crate) fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Mailbox name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}
