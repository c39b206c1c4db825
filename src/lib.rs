//! # fanout-hub
//!
//! In-process publish/subscribe hub that fans messages out to connected
//! WebSocket clients.
//!
//! Producers publish `{type, data}` envelopes either to every client or to
//! all sessions of one user. Each client owns a bounded delivery queue;
//! a client whose queue is full when a message arrives is disconnected
//! rather than allowed to slow down everyone else.
//!
//! ## Architecture
//!
//! ```text
//! Producers (REST, in-process callers)      Clients (WebSocket)
//!     │                                        │
//!     ├── REST Handlers (api/)                 ├── WS Handler (ws/)
//!     │                                        │
//!     └──────────────► Hub (hub/) ◄────────────┘
//!                        │
//!                  dispatch loop: owns the membership set,
//!                  applies register / unregister / broadcast
//!                  one at a time
//!                        │
//!              per-client bounded channels (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod server;
pub mod ws;
