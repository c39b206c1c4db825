//! WebSocket transport: upgrades connections and pumps hub output to them.
//!
//! The endpoint at `/ws` registers one [`crate::domain::ClientHandle`] per
//! connection and forwards everything the hub queues for it. Inbound
//! frames are not interpreted; the socket is push-only.

pub mod connection;
pub mod handler;
