//! Requests accepted by the dispatch loop.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::domain::{ClientHandle, ClientId};

/// Which members a broadcast is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every registered client.
    All,
    /// Every client whose user id equals the given token. May match zero,
    /// one, or many clients.
    User(String),
}

impl Recipients {
    /// Returns `true` if `handle` is addressed by this filter.
    #[must_use]
    pub fn matches(&self, handle: &ClientHandle) -> bool {
        match self {
            Self::All => true,
            Self::User(user_id) => handle.user_id() == user_id,
        }
    }
}

/// Snapshot entry describing one registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Handle id.
    pub client_id: ClientId,
    /// Identity token the client registered with.
    pub user_id: String,
}

/// One unit of work for the dispatch loop.
#[derive(Debug)]
pub(crate) enum Command {
    Register(ClientHandle),
    Unregister(ClientId),
    Broadcast {
        payload: Bytes,
        recipients: Recipients,
    },
    Members(oneshot::Sender<Vec<MemberInfo>>),
    Shutdown,
}
