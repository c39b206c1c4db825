//! Connected-client handle and its delivery channel.
//!
//! [`ClientHandle::new`] returns a pair: the handle, which is moved into
//! the hub on registration and owns the only sending half of the delivery
//! channel, and a [`ClientReceiver`], which the transport keeps and drains.
//! When the hub drops the handle the channel closes, and the receiver sees
//! `None` after the queued payloads.

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::ClientId;

/// Result of one non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload was queued.
    Queued,
    /// The channel is at capacity; the consumer is falling behind.
    Full,
    /// The consuming side is gone.
    Disconnected,
}

/// The hub's side of one connected client.
///
/// Not `Clone`: there is exactly one sender per delivery channel, so
/// dropping the handle is what closes the channel.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    user_id: String,
    sender: mpsc::Sender<Bytes>,
}

/// The transport's side of one connected client.
#[derive(Debug)]
pub struct ClientReceiver {
    id: ClientId,
    receiver: mpsc::Receiver<Bytes>,
}

impl ClientHandle {
    /// Creates a handle for `user_id` with a delivery channel holding at
    /// most `capacity` undelivered payloads (clamped to at least 1).
    #[must_use]
    pub fn new(user_id: impl Into<String>, capacity: usize) -> (Self, ClientReceiver) {
        let id = ClientId::new();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                id,
                user_id: user_id.into(),
                sender,
            },
            ClientReceiver { id, receiver },
        )
    }

    /// Creates a handle for a client that presented no identity token.
    ///
    /// The handle's own id doubles as its user id, so the client can still
    /// be addressed individually but never shares a token with another
    /// connection.
    #[must_use]
    pub fn anonymous(capacity: usize) -> (Self, ClientReceiver) {
        let id = ClientId::new();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                id,
                user_id: id.to_string(),
                sender,
            },
            ClientReceiver { id, receiver },
        )
    }

    /// Returns this handle's unique id.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the identity token used for targeted delivery.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Attempts to queue `payload` without waiting.
    ///
    /// `Bytes` clones are reference-counted, so one encoded envelope is
    /// shared by every recipient.
    pub fn try_deliver(&self, payload: &Bytes) -> Delivery {
        match self.sender.try_send(payload.clone()) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Disconnected,
        }
    }
}

impl ClientReceiver {
    /// Returns the id of the handle this receiver belongs to.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Waits for the next payload. Returns `None` once the hub has closed
    /// the channel and every queued payload has been taken.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    /// Takes the next payload if one is queued.
    ///
    /// # Errors
    ///
    /// Returns [`mpsc::error::TryRecvError::Empty`] when nothing is queued
    /// and [`mpsc::error::TryRecvError::Disconnected`] when the channel is
    /// closed and drained.
    pub fn try_recv(&mut self) -> Result<Bytes, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Returns `true` once the hub has dropped the sending half.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}
