//! The dispatch loop: sole owner of the membership set.
//!
//! Every register, unregister and broadcast request is applied here, one at
//! a time, in arrival order. A broadcast finishes its whole fan-out before
//! the next request is taken, so no request ever sees a half-updated set.
//!
//! Removal always happens by dropping the [`ClientHandle`], which holds the
//! only sender of the client's delivery channel. Closing the channel and
//! leaving the set are therefore one step, and a removed client can never
//! be written to again.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use super::command::{Command, MemberInfo, Recipients};
use crate::domain::{ClientHandle, ClientId, Delivery};

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients addressed by the recipient filter.
    pub matched: usize,
    /// Clients that accepted the payload.
    pub delivered: usize,
    /// Clients removed because their channel was full.
    pub evicted: usize,
    /// Clients removed because their transport already went away.
    pub disconnected: usize,
}

/// State owned by the dispatch task.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    clients: HashMap<ClientId, ClientHandle>,
    commands: mpsc::UnboundedReceiver<Command>,
    client_count: watch::Sender<usize>,
    backlog: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub(crate) fn new(
        commands: mpsc::UnboundedReceiver<Command>,
        client_count: watch::Sender<usize>,
        backlog: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            clients: HashMap::new(),
            commands,
            client_count,
            backlog,
        }
    }

    /// Processes requests until a shutdown request arrives or every
    /// [`super::Hub`] has been dropped.
    pub(crate) async fn run(mut self) {
        tracing::debug!("hub dispatch loop started");
        while let Some(command) = self.commands.recv().await {
            if self.apply(command).is_break() {
                break;
            }
        }
        self.close_all();
        tracing::debug!("hub dispatch loop stopped");
    }

    fn apply(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Register(handle) => self.register(handle),
            Command::Unregister(id) => self.unregister(id),
            Command::Broadcast {
                payload,
                recipients,
            } => {
                self.backlog.fetch_sub(1, Ordering::AcqRel);
                let report = self.broadcast(&payload, &recipients);
                tracing::debug!(
                    matched = report.matched,
                    delivered = report.delivered,
                    evicted = report.evicted,
                    disconnected = report.disconnected,
                    "broadcast dispatched"
                );
            }
            Command::Members(reply) => {
                // The caller may have given up waiting.
                let _ = reply.send(self.members());
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn register(&mut self, handle: ClientHandle) {
        let client_id = handle.id();
        let user_id = handle.user_id().to_owned();
        if self.clients.insert(client_id, handle).is_some() {
            tracing::warn!(%client_id, "client registered twice; previous handle closed");
        }
        self.publish_count();
        tracing::info!(
            %client_id,
            user_id = %user_id,
            clients = self.clients.len(),
            "client connected"
        );
    }

    pub(crate) fn unregister(&mut self, client_id: ClientId) {
        // Dropping the handle closes its delivery channel.
        if self.clients.remove(&client_id).is_some() {
            self.publish_count();
            tracing::info!(
                %client_id,
                clients = self.clients.len(),
                "client disconnected"
            );
        }
    }

    pub(crate) fn broadcast(&mut self, payload: &Bytes, recipients: &Recipients) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        self.clients.retain(|client_id, handle| {
            if !recipients.matches(handle) {
                return true;
            }
            report.matched += 1;
            match handle.try_deliver(payload) {
                Delivery::Queued => {
                    report.delivered += 1;
                    true
                }
                Delivery::Full => {
                    report.evicted += 1;
                    tracing::warn!(
                        %client_id,
                        user_id = %handle.user_id(),
                        "client buffer full; evicting slow consumer"
                    );
                    false
                }
                Delivery::Disconnected => {
                    report.disconnected += 1;
                    tracing::debug!(%client_id, "client receiver gone; removing");
                    false
                }
            }
        });

        if report.evicted + report.disconnected > 0 {
            self.publish_count();
            tracing::info!(
                evicted = report.evicted,
                disconnected = report.disconnected,
                clients = self.clients.len(),
                "clients removed during broadcast"
            );
        }
        report
    }

    pub(crate) fn members(&self) -> Vec<MemberInfo> {
        self.clients
            .values()
            .map(|handle| MemberInfo {
                client_id: handle.id(),
                user_id: handle.user_id().to_owned(),
            })
            .collect()
    }

    fn close_all(&mut self) {
        let closed = self.clients.len();
        self.clients.clear();
        self.publish_count();
        if closed > 0 {
            tracing::info!(closed, "closed all client channels");
        }
    }

    fn publish_count(&self) {
        self.client_count.send_replace(self.clients.len());
    }
}
