//! Shutdown sequencing
//!
//! One process-wide state machine: `Running → Draining → Terminated`.
//! Draining is entered on a termination signal, a fatal pipeline fault, or
//! an explicit stop; repeated triggers are idempotent. The drain sequence
//! wakes every blocked frame waiter, closes all sessions, then waits a
//! bounded grace period for the worker thread and background tasks. Work
//! still outstanding after the grace period makes the shutdown "dirty" and
//! the process exits non-zero, so a stuck thread can never hang the exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::frame::FrameCell;
use crate::server::config::ServerConfig;
use crate::session::SessionRegistry;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Normal operation
    Running,
    /// Termination requested; loops are winding down
    Draining,
    /// Drain complete (terminal)
    Terminated,
}

/// How the pipeline ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All work quiesced within the grace period
    Clean,
    /// Work was still outstanding after the grace period
    Dirty,
    /// A fatal pipeline fault forced the shutdown
    Fault,
}

impl Outcome {
    /// Process exit status for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Clean => 0,
            Outcome::Dirty | Outcome::Fault => 1,
        }
    }
}

/// A background task the coordinator must wait out during drain
pub struct NamedTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl NamedTask {
    /// Wrap a join handle with a diagnostic name
    pub fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }
}

/// Orchestrates the Running → Draining → Terminated transitions
pub struct ShutdownCoordinator {
    tx: watch::Sender<ShutdownState>,
    faulted: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the Running state
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ShutdownState::Running);
        Self {
            tx,
            faulted: AtomicBool::new(false),
        }
    }

    /// Subscribe to state transitions. The receiver's `borrow()` is safe to
    /// call from the blocking worker thread.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.tx.subscribe()
    }

    /// Current state
    pub fn state(&self) -> ShutdownState {
        *self.tx.borrow()
    }

    /// Request drain. Returns true on the Running → Draining transition;
    /// false (and no effect) if draining already began.
    pub fn begin_drain(&self, reason: &str) -> bool {
        let transitioned = self.tx.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                true
            } else {
                false
            }
        });
        if transitioned {
            warn!(reason, "shutting down");
        } else {
            info!(reason, "shutdown already in progress");
        }
        transitioned
    }

    /// Request drain because of a fatal pipeline fault
    pub fn fail(&self, reason: &str) {
        self.faulted.store(true, Ordering::SeqCst);
        self.begin_drain(reason);
    }

    /// Wait until the state leaves Running
    pub async fn draining(&self) {
        let mut rx = self.subscribe();
        while *rx.borrow_and_update() == ShutdownState::Running {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Run the drain sequence and return the shutdown outcome.
    ///
    /// Wakes frame waiters, closes sessions, sleeps the settle window so
    /// loops can observe the state change, then waits out `tasks` under the
    /// grace deadline. Tasks still running at the deadline are named in the
    /// log, aborted, and make the outcome dirty.
    pub async fn drain(
        &self,
        config: &ServerConfig,
        cell: &FrameCell,
        registry: &SessionRegistry,
        tasks: Vec<NamedTask>,
    ) -> Outcome {
        self.begin_drain("drain");

        cell.close();
        registry.close_all("server shutdown").await;

        tokio::time::sleep(config.settle).await;

        let deadline = Instant::now() + config.grace;
        let mut outstanding: Vec<&'static str> = Vec::new();
        for NamedTask { name, mut handle } in tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    outstanding.push(name);
                    handle.abort();
                }
            }
        }

        self.tx.send_replace(ShutdownState::Terminated);

        if !outstanding.is_empty() {
            warn!(tasks = ?outstanding, "work outstanding after grace period");
            info!("dirty shutdown");
            Outcome::Dirty
        } else if self.faulted.load(Ordering::SeqCst) {
            info!("shutdown after pipeline fault");
            Outcome::Fault
        } else {
            info!("clean shutdown");
            Outcome::Clean
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig::default()
            .settle(Duration::from_millis(10))
            .grace(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_drain_transition_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.state(), ShutdownState::Running);

        assert!(coordinator.begin_drain("signal"));
        assert!(!coordinator.begin_drain("signal repeated"));
        assert_eq!(coordinator.state(), ShutdownState::Draining);
    }

    #[tokio::test]
    async fn test_clean_shutdown_when_tasks_finish() {
        let coordinator = ShutdownCoordinator::new();
        let cell = FrameCell::new();
        let registry = SessionRegistry::new();

        let mut rx = coordinator.subscribe();
        let task = tokio::spawn(async move {
            // Quiesce as soon as draining is observed
            while *rx.borrow_and_update() == ShutdownState::Running {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        let outcome = coordinator
            .drain(&test_config(), &cell, &registry, vec![NamedTask::new("worker", task)])
            .await;

        assert_eq!(outcome, Outcome::Clean);
        assert_eq!(coordinator.state(), ShutdownState::Terminated);
    }

    #[tokio::test]
    async fn test_dirty_shutdown_is_bounded() {
        let coordinator = ShutdownCoordinator::new();
        let cell = FrameCell::new();
        let registry = SessionRegistry::new();

        // A task that never quiesces
        let stuck = tokio::spawn(async {
            std::future::pending::<()>().await;
        });

        let config = test_config();
        let started = Instant::now();
        let outcome = coordinator
            .drain(&config, &cell, &registry, vec![NamedTask::new("stuck", stuck)])
            .await;

        assert_eq!(outcome, Outcome::Dirty);
        assert_eq!(outcome.exit_code(), 1);
        // Bounded by settle + grace plus scheduling slack
        assert!(started.elapsed() < config.settle + config.grace + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_fault_outcome_survives_clean_drain() {
        let coordinator = ShutdownCoordinator::new();
        let cell = FrameCell::new();
        let registry = SessionRegistry::new();

        coordinator.fail("camera initialization failed");
        let outcome = coordinator
            .drain(&test_config(), &cell, &registry, Vec::new())
            .await;

        assert_eq!(outcome, Outcome::Fault);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_drain_wakes_frame_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let cell = std::sync::Arc::new(FrameCell::new());
        let registry = SessionRegistry::new();

        let waiter = {
            let cell = std::sync::Arc::clone(&cell);
            tokio::spawn(async move { cell.await_next(0).await })
        };
        tokio::task::yield_now().await;

        coordinator.drain(&test_config(), &cell, &registry, Vec::new()).await;
        assert_eq!(waiter.await.unwrap(), None);
    }
}
