//! Process assembly and lifecycle
//!
//! Wires the capture loop, HTTP front end, session fan-out, and shutdown
//! coordinator together and runs them to completion. The capture loop gets
//! a dedicated blocking thread; everything else is tasks on the runtime.

use std::fs;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::capture::{Camera, CaptureLoop, Detector, EventSender, FrameEncoder};
use crate::error::Result;
use crate::frame::FrameCell;
use crate::server::{self, ServerConfig, ServerState};
use crate::session::{SessionContext, SessionRegistry};
use crate::shutdown::{NamedTask, Outcome, ShutdownCoordinator};
use crate::telemetry::{topics, ChangeMonitor, TelemetryBus, TelemetryValue};

/// The assembled coprocessor
pub struct Pipeline<C, D, E> {
    config: ServerConfig,
    camera: C,
    detector: D,
    encoder: E,
    bus: Arc<dyn TelemetryBus>,
}

impl<C, D, E> Pipeline<C, D, E>
where
    C: Camera + 'static,
    D: Detector + 'static,
    E: FrameEncoder + 'static,
{
    /// Assemble a pipeline around its backends
    pub fn new(
        config: ServerConfig,
        camera: C,
        detector: D,
        encoder: E,
        bus: Arc<dyn TelemetryBus>,
    ) -> Self {
        Self {
            config,
            camera,
            detector,
            encoder,
            bus,
        }
    }

    /// Run until a termination signal or a fatal fault, then drain.
    ///
    /// Returns the shutdown outcome; the caller turns it into the process
    /// exit code.
    pub async fn run(self) -> Result<Outcome> {
        // Bind before anything is spawned: a bind failure must propagate
        // while there is still no worker thread to strand.
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "listening");

        self.bus
            .publish(topics::SERIAL, TelemetryValue::Text(device_serial()));
        self.bus.publish(topics::RUNNING, TelemetryValue::Bool(true));

        let cell = Arc::new(FrameCell::new());
        let registry = Arc::new(SessionRegistry::new());
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let (events, mut event_rx) = EventSender::channel();

        let monitor = ChangeMonitor::new()
            .watch(topics::DIST1, "dist1")
            .watch(topics::BEAM1, "beam1");

        let worker = CaptureLoop::new(
            self.camera,
            self.detector,
            self.encoder,
            Arc::clone(&cell),
            Arc::clone(&self.bus),
            monitor,
            events,
            coordinator.subscribe(),
            self.config.clone(),
        );

        // The worker thread never touches the runtime; its result is
        // observed here and escalated into a drain.
        let capture = {
            let coordinator = Arc::clone(&coordinator);
            let worker = tokio::task::spawn_blocking(move || worker.run());
            tokio::spawn(async move {
                match worker.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => coordinator.fail(&format!("capture loop failed: {e}")),
                    Err(e) => coordinator.fail(&format!("capture loop panicked: {e}")),
                }
            })
        };

        // Bridge worker-thread events onto the session fan-out. Ends when
        // the worker drops its sender.
        let forwarder = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                while let Some(envelope) = event_rx.recv().await {
                    registry.broadcast(envelope).await;
                }
            })
        };

        let context = SessionContext {
            version: self.config.version.clone(),
            asset_dir: self.config.asset_dir.clone(),
        };
        let state = ServerState {
            cell: Arc::clone(&cell),
            registry: Arc::clone(&registry),
            shutdown: coordinator.subscribe(),
            context,
        };
        let http = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                if let Err(e) = server::serve(listener, state).await {
                    error!(error = %e, "server failed");
                    coordinator.fail("server failed");
                }
            })
        };

        let signals = spawn_signal_listener(Arc::clone(&coordinator));

        coordinator.draining().await;
        let outcome = coordinator
            .drain(
                &self.config,
                &cell,
                &registry,
                vec![
                    NamedTask::new("capture", capture),
                    NamedTask::new("server", http),
                    NamedTask::new("forwarder", forwarder),
                ],
            )
            .await;
        signals.abort();

        self.bus.publish(topics::RUNNING, TelemetryValue::Bool(false));
        Ok(outcome)
    }
}

/// Listen for SIGINT and SIGTERM for the life of the process. Repeated
/// signals during drain are logged, not escalated.
fn spawn_signal_listener(coordinator: Arc<ShutdownCoordinator>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "cannot install SIGINT handler");
                return;
            }
        };
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler");
                return;
            }
        };
        loop {
            tokio::select! {
                _ = interrupt.recv() => {
                    coordinator.begin_drain("SIGINT");
                }
                _ = terminate.recv() => {
                    coordinator.begin_drain("SIGTERM");
                }
            }
        }
    })
}

/// Board serial number from `/proc/cpuinfo`, or `"?"` when the platform
/// does not expose one
pub fn device_serial() -> String {
    if let Ok(cpuinfo) = fs::read_to_string("/proc/cpuinfo") {
        for line in cpuinfo.lines() {
            if let Some(rest) = line.strip_prefix("Serial") {
                if let Some((_, value)) = rest.split_once(':') {
                    let value = value.trim();
                    if !value.is_empty() {
                        return value.to_string();
                    }
                }
            }
        }
    }
    "?".to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::capture::{DetectOutcome, RawFrame};
    use crate::error::Error;
    use crate::telemetry::MemoryBus;

    struct BrokenCamera;

    impl Camera for BrokenCamera {
        fn grab(&mut self) -> crate::error::Result<RawFrame> {
            Err(Error::Camera("no such device".into()))
        }
    }

    struct NullDetector;

    impl Detector for NullDetector {
        fn detect(&mut self, frame: &RawFrame) -> crate::error::Result<DetectOutcome> {
            Ok(DetectOutcome {
                annotated: frame.clone(),
                detections: Vec::new(),
            })
        }
    }

    struct NullEncoder;

    impl crate::capture::FrameEncoder for NullEncoder {
        fn encode(&mut self, _frame: &RawFrame) -> crate::error::Result<Bytes> {
            Ok(Bytes::new())
        }
    }

    #[test]
    fn test_device_serial_never_empty() {
        assert!(!device_serial().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bind_failure_leaves_no_worker_behind() {
        // Occupy the port so the pipeline's own bind fails
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let config = ServerConfig::default().bind(addr);
        let bus = Arc::new(MemoryBus::new());
        let pipeline = Pipeline::new(
            config,
            BrokenCamera,
            NullDetector,
            NullEncoder,
            bus.clone() as Arc<dyn TelemetryBus>,
        );

        let result = tokio::time::timeout(Duration::from_secs(5), pipeline.run())
            .await
            .expect("bind failure must return promptly");
        assert!(matches!(result, Err(Error::Io(_))));

        // No capture thread was started, so the runtime can shut down and
        // nothing ever touched the bus
        assert_eq!(bus.read(topics::RUNNING), None);
        assert_eq!(bus.publish_count(topics::TAG_X), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_camera_fault_drains_with_fault_outcome() {
        let config = ServerConfig::default()
            .bind("127.0.0.1:0".parse().unwrap())
            .settle(Duration::from_millis(10))
            .grace(Duration::from_millis(200));
        let bus = Arc::new(MemoryBus::new());
        let pipeline = Pipeline::new(
            config,
            BrokenCamera,
            NullDetector,
            NullEncoder,
            bus.clone() as Arc<dyn TelemetryBus>,
        );

        let outcome = tokio::time::timeout(Duration::from_secs(5), pipeline.run())
            .await
            .expect("pipeline did not drain in time")
            .unwrap();

        assert_eq!(outcome, Outcome::Fault);
        assert_eq!(outcome.exit_code(), 1);
        // Liveness flag raised at start, lowered after drain
        assert_eq!(
            bus.read(topics::RUNNING),
            Some(TelemetryValue::Bool(false))
        );
        assert!(bus.read(topics::SERIAL).is_some());
    }
}
