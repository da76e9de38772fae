//! Bidirectional control sessions and fan-out
//!
//! Each WebSocket client gets a session with its own outbound mailbox and a
//! dedicated sender task. Broadcasting enqueues into every live mailbox
//! without blocking on delivery; a slow or broken session is torn down by
//! its own sender task and never affects the others.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SessionRegistry>
//!                  ┌──────────────────────────┐
//!                  │ sessions: HashMap<id,    │
//!                  │   SessionHandle {        │
//!                  │     tx: mpsc::Sender,    │
//!                  │   }                      │
//!                  │ >                        │
//!                  └────────────┬─────────────┘
//!                               │ broadcast(envelope)
//!              ┌────────────────┼────────────────┐
//!              ▼                ▼                ▼
//!         [mailbox]        [mailbox]        [mailbox]
//!         sender task      sender task      sender task
//!              │                │                │
//!              └──► WebSocket   └──► WebSocket   └──► WebSocket
//! ```

pub mod client;
pub mod digest;
pub mod message;
pub mod registry;

pub use client::{Outbound, SessionContext};
pub use message::Envelope;
pub use registry::SessionRegistry;
