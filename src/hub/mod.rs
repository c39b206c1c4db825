//! The client registry and its dispatch loop.
//!
//! [`Hub`] is a cheaply cloneable handle onto one running dispatch task.
//! Producers call [`Hub::broadcast`] and [`Hub::broadcast_to_user`]; the
//! WebSocket transport calls [`Hub::register`] and [`Hub::unregister`].
//! None of these wait: each one enqueues a request for the dispatch task
//! and returns.
//!
//! # Backpressure
//!
//! Delivery into a client's channel is a single non-blocking attempt. A
//! client whose channel is full is evicted in the same broadcast pass and
//! its channel is closed; the transport sees the closure and disconnects.
//! Slow consumers never hold up anyone else.
//!
//! Producers get the same treatment one level up: broadcasts waiting for
//! the dispatch task are counted, and once that backlog reaches its limit
//! further broadcasts fail with [`HubError::Overloaded`] instead of
//! queueing. Register and unregister are never refused.

mod command;
mod dispatcher;

pub use command::{MemberInfo, Recipients};
pub use dispatcher::BroadcastReport;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use self::command::Command;
use self::dispatcher::Dispatcher;
use crate::domain::{ClientHandle, ClientId, Envelope};
use crate::error::HubError;

/// Handle onto a running dispatch loop.
///
/// Clones share the same loop. The loop stops after [`Hub::shutdown`] or
/// once every clone has been dropped.
#[derive(Debug, Clone)]
pub struct Hub {
    commands: mpsc::UnboundedSender<Command>,
    client_count: watch::Receiver<usize>,
    backlog: Arc<AtomicUsize>,
    max_backlog: usize,
}

/// Default number of broadcasts allowed to wait for the dispatch task.
pub const DEFAULT_BROADCAST_BACKLOG: usize = 10_000;

impl Hub {
    /// Spawns the dispatch loop on the current Tokio runtime with the
    /// default broadcast backlog.
    ///
    /// Returns the hub and the loop's task handle, which completes once the
    /// loop has stopped and closed every remaining client channel.
    #[must_use]
    pub fn start() -> (Self, JoinHandle<()>) {
        Self::start_with_backlog(DEFAULT_BROADCAST_BACKLOG)
    }

    /// Spawns the dispatch loop, allowing at most `max_backlog` broadcasts
    /// (clamped to at least 1) to wait for it at any time.
    #[must_use]
    pub fn start_with_backlog(max_backlog: usize) -> (Self, JoinHandle<()>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (count_tx, client_count) = watch::channel(0);
        let backlog = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(command_rx, count_tx, Arc::clone(&backlog));
        let task = tokio::spawn(dispatcher.run());
        (
            Self {
                commands,
                client_count,
                backlog,
                max_backlog: max_backlog.max(1),
            },
            task,
        )
    }

    /// Adds a client to the membership set.
    ///
    /// If the hub has already stopped, the handle is dropped, which closes
    /// its channel; the transport observes that as an immediate disconnect.
    pub fn register(&self, handle: ClientHandle) {
        let client_id = handle.id();
        if self.send(Command::Register(handle)).is_err() {
            tracing::debug!(%client_id, "register after hub shutdown; closing client");
        }
    }

    /// Removes a client and closes its channel. Unknown or already removed
    /// ids are ignored.
    pub fn unregister(&self, client_id: ClientId) {
        // A stopped hub has already closed every channel.
        let _ = self.send(Command::Unregister(client_id));
    }

    /// Sends `{type, data}` to every registered client.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serialization`] if `data` cannot be encoded, in
    /// which case no client is touched, [`HubError::Overloaded`] if too many
    /// broadcasts are already waiting, or [`HubError::HubStopped`] if the
    /// dispatch loop is no longer running.
    pub fn broadcast<T>(&self, message_type: &str, data: &T) -> Result<(), HubError>
    where
        T: Serialize + ?Sized,
    {
        let payload = encode(message_type, data)?;
        self.broadcast_raw(payload, Recipients::All)
    }

    /// Sends `{type, data}` to every client registered under `user_id`.
    ///
    /// Matching no client is not an error.
    ///
    /// # Errors
    ///
    /// Same as [`Hub::broadcast`].
    pub fn broadcast_to_user<T>(
        &self,
        user_id: &str,
        message_type: &str,
        data: &T,
    ) -> Result<(), HubError>
    where
        T: Serialize + ?Sized,
    {
        let payload = encode(message_type, data)?;
        self.broadcast_raw(payload, Recipients::User(user_id.to_owned()))
    }

    /// Sends an already encoded payload to `recipients`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Overloaded`] if the broadcast backlog is full
    /// and [`HubError::HubStopped`] if the dispatch loop is no longer
    /// running.
    pub fn broadcast_raw(&self, payload: Bytes, recipients: Recipients) -> Result<(), HubError> {
        let waiting = self.backlog.fetch_add(1, Ordering::AcqRel);
        if waiting >= self.max_backlog {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!(backlog = waiting, "broadcast backlog full; rejecting message");
            return Err(HubError::Overloaded);
        }
        self.send(Command::Broadcast {
            payload,
            recipients,
        })
        .inspect_err(|_| {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
        })
    }

    /// Returns the number of broadcasts waiting for the dispatch loop.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    /// Returns the number of registered clients as of the last request the
    /// dispatch loop finished applying.
    #[must_use]
    pub fn client_count(&self) -> usize {
        *self.client_count.borrow()
    }

    /// Returns a snapshot of the membership set.
    ///
    /// The snapshot is taken by the dispatch loop itself, after every
    /// request this caller issued earlier has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubStopped`] if the dispatch loop is no longer
    /// running.
    pub async fn members(&self) -> Result<Vec<MemberInfo>, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Members(reply))?;
        response.await.map_err(|_| HubError::HubStopped)
    }

    /// Asks the dispatch loop to close every client channel and stop.
    ///
    /// Requests already queued ahead of the shutdown are still applied.
    pub fn shutdown(&self) {
        if self.send(Command::Shutdown).is_ok() {
            tracing::info!("hub shutdown requested");
        }
    }

    /// Returns `true` while the dispatch loop is accepting requests.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), HubError> {
        self.commands
            .send(command)
            .map_err(|_| HubError::HubStopped)
    }
}

fn encode<T>(message_type: &str, data: &T) -> Result<Bytes, HubError>
where
    T: Serialize + ?Sized,
{
    Envelope::new(message_type, data).encode().inspect_err(|err| {
        tracing::warn!(message_type, error = %err, "failed to encode broadcast message");
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use serde_json::{Value, json};
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::ClientReceiver;

    async fn next_json(rx: &mut ClientReceiver) -> Value {
        let Some(bytes) = rx.recv().await else {
            panic!("channel closed");
        };
        let Ok(value) = serde_json::from_slice(&bytes) else {
            panic!("payload is not json");
        };
        value
    }

    async fn settle(hub: &Hub) -> Vec<MemberInfo> {
        let Ok(members) = hub.members().await else {
            panic!("hub stopped");
        };
        members
    }

    #[tokio::test]
    async fn broadcast_fans_out_to_all_clients() {
        let (hub, _task) = Hub::start();
        let mut receivers = Vec::new();
        for user in ["a", "b", "c", "d"] {
            let (handle, rx) = ClientHandle::new(user, 8);
            hub.register(handle);
            receivers.push(rx);
        }

        assert_ok!(hub.broadcast("tick", &json!({ "n": 1 })));
        settle(&hub).await;

        for rx in &mut receivers {
            assert_eq!(next_json(rx).await, json!({ "type": "tick", "data": { "n": 1 } }));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn slow_client_is_evicted_and_closed() {
        let (hub, _task) = Hub::start();
        let (slow, mut slow_rx) = ClientHandle::new("slow", 1);
        let (fast, mut fast_rx) = ClientHandle::new("fast", 8);
        let slow_id = slow.id();
        hub.register(slow);
        hub.register(fast);

        assert_ok!(hub.broadcast("m", &1));
        assert_ok!(hub.broadcast("m", &2));
        let members = settle(&hub).await;

        assert_eq!(members.len(), 1);
        assert!(members.iter().all(|m| m.client_id != slow_id));
        assert_eq!(hub.client_count(), 1);

        assert_eq!(next_json(&mut slow_rx).await, json!({ "type": "m", "data": 1 }));
        assert!(slow_rx.recv().await.is_none());

        assert_eq!(next_json(&mut fast_rx).await, json!({ "type": "m", "data": 1 }));
        assert_eq!(next_json(&mut fast_rx).await, json!({ "type": "m", "data": 2 }));
    }

    #[tokio::test]
    async fn targeted_broadcast_reaches_every_session_of_user() {
        let (hub, _task) = Hub::start();
        let (u1a, mut rx_u1a) = ClientHandle::new("u1", 8);
        let (u1b, mut rx_u1b) = ClientHandle::new("u1", 8);
        let (u2, mut rx_u2) = ClientHandle::new("u2", 8);
        hub.register(u1a);
        hub.register(u1b);
        hub.register(u2);

        assert_ok!(hub.broadcast_to_user("u1", "notice", "hello"));
        assert_ok!(hub.broadcast_to_user("nobody", "notice", "lost"));
        settle(&hub).await;

        let expected = json!({ "type": "notice", "data": "hello" });
        assert_eq!(next_json(&mut rx_u1a).await, expected);
        assert_eq!(next_json(&mut rx_u1b).await, expected);
        assert!(rx_u1a.try_recv().is_err());
        assert!(rx_u2.try_recv().is_err());
        assert_eq!(hub.client_count(), 3);
    }

    #[tokio::test]
    async fn sequential_broadcasts_keep_order() {
        let (hub, _task) = Hub::start();
        let (handle, mut rx) = ClientHandle::new("u1", 16);
        hub.register(handle);

        for n in 0..10 {
            assert_ok!(hub.broadcast("seq", &n));
        }
        settle(&hub).await;

        for n in 0..10 {
            assert_eq!(next_json(&mut rx).await, json!({ "type": "seq", "data": n }));
        }
    }

    #[tokio::test]
    async fn unregister_twice_changes_nothing() {
        let (hub, _task) = Hub::start();
        let (a, mut rx_a) = ClientHandle::new("a", 4);
        let (b, _rx_b) = ClientHandle::new("b", 4);
        let a_id = a.id();
        hub.register(a);
        hub.register(b);

        hub.unregister(a_id);
        hub.unregister(a_id);
        hub.unregister(ClientId::new());
        let members = settle(&hub).await;

        assert_eq!(members.len(), 1);
        assert!(members.iter().all(|m| m.user_id == "b"));
        assert!(rx_a.recv().await.is_none());
    }

    #[tokio::test]
    async fn no_delivery_after_unregister() {
        let (hub, _task) = Hub::start();
        let (handle, mut rx) = ClientHandle::new("a", 4);
        let id = handle.id();
        hub.register(handle);
        assert_ok!(hub.broadcast("before", &()));
        hub.unregister(id);
        assert_ok!(hub.broadcast("after", &()));
        settle(&hub).await;

        assert_eq!(next_json(&mut rx).await, json!({ "type": "before", "data": null }));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn serialization_failure_leaves_hub_intact() {
        let (hub, _task) = Hub::start();
        let (handle, mut rx) = ClientHandle::new("a", 4);
        hub.register(handle);

        let mut bad = HashMap::new();
        bad.insert(vec![1_u8], "non-string key");
        let result = hub.broadcast("bad", &bad);
        assert!(matches!(result, Err(HubError::Serialization(_))));

        assert_ok!(hub.broadcast("good", &true));
        assert_eq!(settle(&hub).await.len(), 1);
        assert_eq!(next_json(&mut rx).await, json!({ "type": "good", "data": true }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn membership_follows_last_operation() {
        let (hub, _task) = Hub::start();
        let mut ids = Vec::new();
        let mut receivers = Vec::new();
        for n in 0..6 {
            let (handle, rx) = ClientHandle::new(format!("user-{n}"), 4);
            ids.push(handle.id());
            receivers.push(rx);
            hub.register(handle);
        }
        for id in ids.iter().step_by(2) {
            hub.unregister(*id);
        }

        let members = settle(&hub).await;
        assert_eq!(members.len(), 3);
        for (n, id) in ids.iter().enumerate() {
            let present = members.iter().any(|m| m.client_id == *id);
            assert_eq!(present, n % 2 == 1);
        }
        assert_eq!(hub.client_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_deliver_everything() {
        let (hub, _task) = Hub::start();
        let (handle, mut rx) = ClientHandle::new("a", 1024);
        hub.register(handle);

        let mut producers = Vec::new();
        for producer in 0..4 {
            let hub = hub.clone();
            producers.push(tokio::spawn(async move {
                for n in 0..50 {
                    assert_ok!(hub.broadcast("p", &json!({ "producer": producer, "n": n })));
                }
            }));
        }
        for producer in producers {
            assert_ok!(producer.await);
        }
        settle(&hub).await;

        let mut last_seen = [-1_i64; 4];
        for _ in 0..200 {
            let value = next_json(&mut rx).await;
            let Some(data) = value.get("data") else {
                panic!("missing data");
            };
            let producer = data.get("producer").and_then(Value::as_u64).unwrap_or(0);
            let n = data.get("n").and_then(Value::as_i64).unwrap_or(-1);
            let Some(slot) = usize::try_from(producer)
                .ok()
                .and_then(|p| last_seen.get_mut(p))
            else {
                panic!("unknown producer");
            };
            assert!(n > *slot, "producer {producer} out of order");
            *slot = n;
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_register_and_broadcast_agree_on_count() {
        let (hub, _task) = Hub::start();

        let mut tasks = Vec::new();
        for n in 0..8 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                let (handle, rx) = ClientHandle::new(format!("user-{n}"), 512);
                hub.register(handle);
                rx
            }));
        }
        for _ in 0..4 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                let (handle, rx) = ClientHandle::new("producer", 512);
                let id = handle.id();
                hub.register(handle);
                for n in 0..100 {
                    assert_ok!(hub.broadcast("tick", &n));
                }
                hub.unregister(id);
                rx
            }));
        }

        let mut receivers = Vec::new();
        for task in tasks {
            let Ok(rx) = task.await else {
                panic!("task failed");
            };
            receivers.push(rx);
        }

        let members = settle(&hub).await;
        assert_eq!(members.len(), 8);
        assert_eq!(hub.client_count(), members.len());
        assert!(members.iter().all(|m| m.user_id.starts_with("user-")));
        assert_eq!(hub.backlog(), 0);
    }

    #[tokio::test]
    async fn full_backlog_rejects_broadcasts_until_drained() {
        let (hub, _task) = Hub::start_with_backlog(3);
        let (handle, mut rx) = ClientHandle::new("a", 8);
        hub.register(handle);

        // The dispatch task cannot run until this task yields.
        for n in 0..3 {
            assert_ok!(hub.broadcast("queued", &n));
        }
        assert!(matches!(hub.broadcast("dropped", &3), Err(HubError::Overloaded)));
        assert_eq!(hub.backlog(), 3);

        settle(&hub).await;
        assert_eq!(hub.backlog(), 0);
        assert_ok!(hub.broadcast("queued", &4));
        settle(&hub).await;

        for n in [0, 1, 2, 4] {
            assert_eq!(next_json(&mut rx).await, json!({ "type": "queued", "data": n }));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_closes_clients_and_rejects_requests() {
        let (hub, task) = Hub::start();
        let (handle, mut rx) = ClientHandle::new("a", 4);
        hub.register(handle);
        assert_ok!(hub.broadcast("last", &()));

        hub.shutdown();
        assert_ok!(task.await);

        assert_eq!(next_json(&mut rx).await, json!({ "type": "last", "data": null }));
        assert!(rx.recv().await.is_none());
        assert!(!hub.is_running());
        assert_eq!(hub.client_count(), 0);
        assert!(matches!(hub.broadcast("x", &()), Err(HubError::HubStopped)));
        assert!(matches!(hub.members().await, Err(HubError::HubStopped)));

        let (late, late_rx) = ClientHandle::new("late", 4);
        hub.register(late);
        assert!(late_rx.is_closed());
    }

    #[tokio::test]
    async fn dropping_every_hub_stops_the_loop() {
        let (hub, task) = Hub::start();
        let (handle, rx) = ClientHandle::new("a", 4);
        hub.register(handle);
        drop(hub);

        assert_ok!(task.await);
        assert!(rx.is_closed());
    }
}
