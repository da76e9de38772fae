//! Single-slot frame handoff between the capture thread and stream readers
//!
//! The capture loop overwrites the slot with the newest encoded frame; any
//! number of readers wait for a sequence number greater than the last one
//! they saw. There is no queue: a reader that falls behind simply observes
//! the latest frame on its next wakeup (drop-latest semantics).
//!
//! # Architecture
//!
//! ```text
//!   capture thread                     event loop
//!   ──────────────                     ──────────
//!   publish(bytes) ──► FrameCell ◄── await_next(last_seen)  [stream client]
//!        seq += 1      { bytes,  ◄── await_next(last_seen)  [stream client]
//!     notify_waiters     seq }   ◄── await_next(last_seen)  [stream client]
//! ```
//!
//! `bytes::Bytes` is reference counted, so every reader shares the same
//! frame allocation.

pub mod cell;

pub use cell::FrameCell;
