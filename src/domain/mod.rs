//! Domain layer: client identity, client handles, and the message envelope.
//!
//! These types are shared between the hub, which owns the sending half of
//! every delivery channel, and the WebSocket transport, which drains the
//! receiving half.

pub mod client;
pub mod client_id;
pub mod envelope;

pub use client::{ClientHandle, ClientReceiver, Delivery};
pub use client_id::ClientId;
pub use envelope::Envelope;
