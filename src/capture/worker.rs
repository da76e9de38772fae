//! Blocking capture loop
//!
//! Runs on a dedicated worker context so camera I/O never stalls network
//! I/O. Each iteration: grab → detect → report position → encode →
//! publish → change-monitor pass → periodic rate report. The shutdown flag
//! is polled at the top of every iteration; the device call itself cannot
//! be interrupted mid-flight.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::camera::{Camera, FrameEncoder};
use super::detect::Detector;
use crate::error::{Error, Result};
use crate::frame::FrameCell;
use crate::session::message::{self, Envelope};
use crate::server::config::ServerConfig;
use crate::shutdown::ShutdownState;
use crate::telemetry::{topics, ChangeMonitor, TelemetryBus, TelemetryValue};

/// Consecutive iteration failures before the loop gives up and escalates
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Thread-safe handle for pushing session broadcasts from the worker
/// thread. A forwarder task on the event loop drains the channel and calls
/// the registry, so the worker never touches cooperative-scheduler state.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    /// Create a sender and its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a broadcast; dropped silently once the forwarder is gone
    /// (shutdown in progress)
    pub fn send(&self, envelope: Envelope) {
        let _ = self.tx.send(envelope);
    }
}

/// The sensing pipeline driver
pub struct CaptureLoop<C, D, E> {
    camera: C,
    detector: D,
    encoder: E,
    cell: Arc<FrameCell>,
    bus: Arc<dyn TelemetryBus>,
    monitor: ChangeMonitor,
    events: EventSender,
    shutdown: watch::Receiver<ShutdownState>,
    config: ServerConfig,
}

impl<C: Camera, D: Detector, E: FrameEncoder> CaptureLoop<C, D, E> {
    /// Assemble a capture loop around its collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: C,
        detector: D,
        encoder: E,
        cell: Arc<FrameCell>,
        bus: Arc<dyn TelemetryBus>,
        monitor: ChangeMonitor,
        events: EventSender,
        shutdown: watch::Receiver<ShutdownState>,
        config: ServerConfig,
    ) -> Self {
        Self {
            camera,
            detector,
            encoder,
            cell,
            bus,
            monitor,
            events,
            shutdown,
            config,
        }
    }

    /// Run until shutdown is signalled or the pipeline faults.
    ///
    /// Blocking; call from `tokio::task::spawn_blocking`.
    pub fn run(mut self) -> Result<()> {
        info!(cam = self.config.camera_index, "capture loop started");

        let mut consecutive_failures = 0u32;
        let mut frames_since_report = 0u64;
        let mut last_report = Instant::now();

        while *self.shutdown.borrow() == ShutdownState::Running {
            if let Err(e) = self.iterate() {
                consecutive_failures += 1;
                warn!(
                    error = %e,
                    failures = consecutive_failures,
                    "capture iteration failed, skipping frame"
                );
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(Error::PipelineFault {
                        failures: consecutive_failures,
                        last: e.to_string(),
                    });
                }
                continue;
            }
            consecutive_failures = 0;
            frames_since_report += 1;

            let elapsed = last_report.elapsed();
            if elapsed >= self.config.report_interval {
                let secs = elapsed.as_secs_f64();
                let rate = frames_since_report as f64 / secs;
                self.bus.publish(topics::FPS, TelemetryValue::Float(rate));
                self.events.send(message::rate(
                    self.config.camera_index,
                    secs,
                    frames_since_report,
                ));
                debug!(fps = rate, frames = frames_since_report, "capture rate");
                last_report = Instant::now();
                frames_since_report = 0;
            }
        }

        debug!("capture loop exiting");
        Ok(())
    }

    fn iterate(&mut self) -> Result<()> {
        let frame = self.camera.grab()?;

        let mut outcome = self.detector.detect(&frame)?;
        outcome.sort_by_margin();

        // Report the primary detection position; fall back to the frame
        // center when nothing was found so consumers see a neutral target.
        let (x, y) = match outcome.primary() {
            Some(primary) => (primary.x, primary.y),
            None => frame.center(),
        };
        self.bus.publish(topics::TAG_X, TelemetryValue::Int(x));
        self.bus.publish(topics::TAG_Y, TelemetryValue::Int(y));

        let encoded = self.encoder.encode(&outcome.annotated)?;
        self.cell.publish(encoded);

        let events = &self.events;
        self.monitor.poll(self.bus.as_ref(), &mut |label, value| {
            events.send(message::data(label, value));
        });

        Ok(())
    }
}
