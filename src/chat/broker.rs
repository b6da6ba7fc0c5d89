//! Publish/subscribe broker for chat messages.
//!
//! A single coordinator task owns the set of subscriber mailboxes. Every
//! subscribe, unsubscribe and publish request is sent to it over an
//! unbounded channel and handled one at a time, so the subscriber set is
//! never touched from two places at once and no lock is needed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::message::ChatMessage;

/// Capacity of each subscriber mailbox.
pub const MAILBOX_CAPACITY: usize = 5;

/// Identifier of a registered mailbox.
pub type MailboxId = u64;

/// Requests serialized through the coordinator.
#[derive(Debug)]
enum BrokerRequest {
    Subscribe(MailboxId, mpsc::Sender<ChatMessage>),
    Unsubscribe(MailboxId),
    Publish(ChatMessage),
    Count(oneshot::Sender<usize>),
    Stop,
}

/// Receiving end of a subscription.
///
/// `recv` returns `None` once the mailbox has been unsubscribed (after any
/// messages already queued are drained) or the broker has stopped.
#[derive(Debug)]
pub struct Mailbox {
    id: MailboxId,
    receiver: mpsc::Receiver<ChatMessage>,
}

impl Mailbox {
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.receiver.recv().await
    }

    /// Take a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<ChatMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Handle to the broker coordinator. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Broker {
    requests: mpsc::UnboundedSender<BrokerRequest>,
    next_id: Arc<AtomicU64>,
}

impl Broker {
    /// Spawn the coordinator task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start() -> Self {
        let (requests, receiver) = mpsc::unbounded_channel();
        tokio::spawn(coordinate(receiver));
        Self {
            requests,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new mailbox for all future publications.
    pub fn subscribe(&self) -> Mailbox {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
        self.send(BrokerRequest::Subscribe(id, sender));
        Mailbox { id, receiver }
    }

    /// Remove a mailbox. Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: MailboxId) {
        self.send(BrokerRequest::Unsubscribe(id));
    }

    /// Queue `message` for fan-out. Never waits on subscribers.
    pub fn publish(&self, message: ChatMessage) {
        self.send(BrokerRequest::Publish(message));
    }

    /// Number of mailboxes currently registered.
    ///
    /// Answered in order with other requests, so it reflects every
    /// subscribe/unsubscribe issued before the call.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(BrokerRequest::Count(tx));
        rx.await.unwrap_or(0)
    }

    /// Stop the coordinator. Every mailbox is closed.
    pub fn stop(&self) {
        self.send(BrokerRequest::Stop);
    }

    fn send(&self, request: BrokerRequest) {
        if self.requests.send(request).is_err() {
            debug!("Broker stopped; request dropped");
        }
    }
}

async fn coordinate(mut requests: mpsc::UnboundedReceiver<BrokerRequest>) {
    let mut subscribers: HashMap<MailboxId, mpsc::Sender<ChatMessage>> = HashMap::new();

    while let Some(request) = requests.recv().await {
        match request {
            BrokerRequest::Subscribe(id, sender) => {
                subscribers.insert(id, sender);
                debug!(mailbox = id, total = subscribers.len(), "Mailbox subscribed");
            }
            BrokerRequest::Unsubscribe(id) => {
                if subscribers.remove(&id).is_some() {
                    debug!(mailbox = id, total = subscribers.len(), "Mailbox unsubscribed");
                }
            }
            BrokerRequest::Publish(message) => {
                for (id, sender) in &subscribers {
                    // Full mailbox: this subscriber misses the message.
                    if sender.try_send(message.clone()).is_err() {
                        debug!(mailbox = id, "Mailbox full or closed; message dropped");
                    }
                }
            }
            BrokerRequest::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
            BrokerRequest::Stop => break,
        }
    }

    debug!("Broker coordinator stopped");
}
