//! Latest-value frame cell
//!
//! `publish` is synchronous and safe to call from the blocking capture
//! thread; `await_next` is the cooperative-scheduler side. The wake is
//! fire-and-forget: `notify_waiters` schedules waiter wakeups and returns,
//! so a stalled reader can never block the publisher.

use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

struct Slot {
    data: Bytes,
    sequence: u64,
    closed: bool,
}

/// Single-slot, thread-safe "latest frame" cell with a monotonic sequence
pub struct FrameCell {
    slot: Mutex<Slot>,
    ready: Notify,
}

impl FrameCell {
    /// Create an empty cell (sequence 0, no frame)
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                data: Bytes::new(),
                sequence: 0,
                closed: false,
            }),
            ready: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // The critical sections below cannot panic, but recover from
        // poisoning anyway so one panicked reader cannot wedge the pipeline.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the stored frame, increment the sequence, wake all waiters.
    ///
    /// Returns the new sequence number.
    pub fn publish(&self, data: Bytes) -> u64 {
        let sequence = {
            let mut slot = self.lock();
            slot.data = data;
            slot.sequence += 1;
            slot.sequence
        };
        self.ready.notify_waiters();
        sequence
    }

    /// Mark the cell closed and wake all waiters.
    ///
    /// Blocked `await_next` callers observe `None` once no newer frame is
    /// available. Used by the shutdown coordinator so stream loops exit.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_waiters();
    }

    /// Current sequence number (0 until the first publish)
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    /// Wait until the stored sequence is strictly greater than `last_seen`.
    ///
    /// Returns immediately if a newer frame is already stored. Returns
    /// `None` once the cell is closed and nothing newer will arrive.
    pub async fn await_next(&self, last_seen: u64) -> Option<(Bytes, u64)> {
        // `notify_waiters` only wakes registered waiters, so the interest
        // must be enabled before re-checking the slot state.
        let mut notified = pin!(self.ready.notified());
        loop {
            notified.as_mut().enable();
            {
                let slot = self.lock();
                if slot.sequence > last_seen {
                    return Some((slot.data.clone(), slot.sequence));
                }
                if slot.closed {
                    return None;
                }
            }
            notified.as_mut().await;
            notified.set(self.ready.notified());
        }
    }
}

impl Default for FrameCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_immediate_return_when_newer() {
        let cell = FrameCell::new();
        cell.publish(Bytes::from_static(b"a"));
        cell.publish(Bytes::from_static(b"b"));

        // last_seen 0: the newest frame is returned without waiting
        let (data, seq) = cell.await_next(0).await.unwrap();
        assert_eq!(seq, 2);
        assert_eq!(&data[..], b"b");

        // Intermediate frame "a" was overwritten, never queued
        let (data, seq) = cell.await_next(1).await.unwrap();
        assert_eq!(seq, 2);
        assert_eq!(&data[..], b"b");
    }

    #[tokio::test]
    async fn test_waiter_woken_by_publish() {
        let cell = Arc::new(FrameCell::new());

        let reader = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.await_next(0).await })
        };
        tokio::task::yield_now().await;

        cell.publish(Bytes::from_static(b"frame"));

        let (data, seq) = reader.await.unwrap().unwrap();
        assert_eq!(seq, 1);
        assert_eq!(&data[..], b"frame");
    }

    #[tokio::test]
    async fn test_publish_from_worker_thread() {
        let cell = Arc::new(FrameCell::new());

        let reader = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.await_next(0).await })
        };
        tokio::task::yield_now().await;

        let publisher = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || cell.publish(Bytes::from_static(b"x")))
        };
        assert_eq!(publisher.join().unwrap(), 1);

        let (_, seq) = reader.await.unwrap().unwrap();
        assert_eq!(seq, 1);
    }

    #[tokio::test]
    async fn test_monotonic_sequences() {
        let cell = Arc::new(FrameCell::new());
        let (ack_tx, mut ack_rx) = tokio::sync::mpsc::unbounded_channel();

        let reader = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                let mut last = 0;
                while let Some((_, seq)) = cell.await_next(last).await {
                    assert!(seq > last);
                    seen.push(seq);
                    last = seq;
                    ack_tx.send(seq).unwrap();
                }
                seen
            })
        };

        // Pace publishes on reader acknowledgements so every sequence is
        // observed, then verify strict monotonicity end to end.
        for i in 1..=10u64 {
            cell.publish(Bytes::from(vec![i as u8]));
            assert_eq!(ack_rx.recv().await, Some(i));
        }
        cell.close();

        let seen = reader.await.unwrap();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_stalled_reader_does_not_block_publisher() {
        let cell = Arc::new(FrameCell::new());

        // A waiter that is registered but never polled again
        let stalled = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.await_next(u64::MAX).await })
        };
        tokio::task::yield_now().await;

        // Publishing many frames must complete regardless of the waiter
        let start = std::time::Instant::now();
        for _ in 0..1000 {
            cell.publish(Bytes::from_static(b"frame"));
        }
        assert_eq!(cell.sequence(), 1000);
        assert!(start.elapsed() < Duration::from_secs(5));

        cell.close();
        assert_eq!(stalled.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_never_misses_final_value() {
        let cell = FrameCell::new();
        for i in 1..=5u8 {
            cell.publish(Bytes::from(vec![i]));
        }

        // A reader that joins late still observes the final frame
        let (data, seq) = cell.await_next(0).await.unwrap();
        assert_eq!(seq, 5);
        assert_eq!(&data[..], [5]);
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_waiters() {
        let cell = Arc::new(FrameCell::new());

        let waiter = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.await_next(0).await })
        };
        tokio::task::yield_now().await;

        cell.close();
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_newer_frame_returned_even_after_close() {
        let cell = FrameCell::new();
        cell.publish(Bytes::from_static(b"last"));
        cell.close();

        // The final frame is still deliverable to a reader that had not
        // caught up; only then does the cell report closed.
        let (_, seq) = cell.await_next(0).await.unwrap();
        assert_eq!(seq, 1);
        assert_eq!(cell.await_next(1).await, None);
    }
}
