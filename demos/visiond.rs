//! Synthetic vision daemon example
//!
//! Run with: cargo run --example visiond [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example visiond                  # binds to 0.0.0.0:8000
//!   cargo run --example visiond localhost        # binds to 127.0.0.1:8000
//!   cargo run --example visiond 127.0.0.1:8080   # binds to 127.0.0.1:8080
//!
//! No camera hardware needed: frames are generated, the detector reports a
//! tag orbiting the frame center, and a background task toggles a distance
//! sensor so control sessions see change notifications.
//!
//! ## Watching
//!
//! Live feed:  open http://localhost:8000/stream in a browser
//! Sessions:   connect a WebSocket client to ws://localhost:8000/ws and
//!             send {"_t":"auth","uuid":"demo"}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tagcam::capture::{Camera, DetectOutcome, Detection, Detector, FrameEncoder, RawFrame};
use tagcam::telemetry::{topics, MemoryBus, TelemetryBus, TelemetryValue};
use tagcam::{Pipeline, Result, ServerConfig};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// Generates a scrolling gradient at roughly 30 frames per second
struct SyntheticCamera {
    tick: u64,
}

impl Camera for SyntheticCamera {
    fn grab(&mut self) -> Result<RawFrame> {
        // Stand in for the blocking device read
        std::thread::sleep(Duration::from_millis(33));
        self.tick += 1;

        let mut pixels = vec![0u8; (WIDTH * HEIGHT) as usize];
        for (i, px) in pixels.iter_mut().enumerate() {
            *px = ((i as u64 + self.tick * 3) % 256) as u8;
        }
        Ok(RawFrame::new(WIDTH, HEIGHT, Bytes::from(pixels)))
    }
}

/// Reports one tag orbiting the frame center, dropping out periodically so
/// the center fallback is visible too
struct OrbitDetector {
    tick: u64,
}

impl Detector for OrbitDetector {
    fn detect(&mut self, frame: &RawFrame) -> Result<DetectOutcome> {
        self.tick += 1;

        let detections = if self.tick % 90 < 60 {
            let angle = self.tick as f64 / 30.0;
            let (cx, cy) = frame.center();
            vec![Detection {
                id: 7,
                x: cx + (angle.cos() * 80.0) as i64,
                y: cy + (angle.sin() * 60.0) as i64,
                margin: 40.0,
            }]
        } else {
            Vec::new()
        };

        Ok(DetectOutcome {
            annotated: frame.clone(),
            detections,
        })
    }
}

/// Passes raw pixels through unchanged. Browsers will not render these as
/// JPEG, but every byte of the multipart framing is real; point curl at
/// /stream to see it.
struct RawEncoder;

impl FrameEncoder for RawEncoder {
    fn encode(&mut self, frame: &RawFrame) -> Result<Bytes> {
        Ok(frame.data.clone())
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8000
/// - "127.0.0.1" -> 127.0.0.1:8000
/// - "127.0.0.1:8080" -> 127.0.0.1:8080
fn parse_bind_addr(arg: &str) -> std::result::Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8000;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: visiond [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8000)");
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8000".parse().unwrap(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tagcam=debug".parse()?)
                .add_directive("visiond=debug".parse()?),
        )
        .init();

    let config = ServerConfig::default().bind(bind_addr);
    let bus = Arc::new(MemoryBus::new());

    // Simulate a rangefinder: sessions only hear about it when the value
    // actually changes.
    {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            let mut near = false;
            loop {
                tokio::time::sleep(Duration::from_secs(3)).await;
                near = !near;
                let distance = if near { 0.4 } else { 2.5 };
                bus.set(topics::DIST1, TelemetryValue::Float(distance));
            }
        });
    }

    println!("Starting vision daemon on {}", config.bind_addr);
    println!();
    println!("Live feed:  http://localhost:{}/stream", config.bind_addr.port());
    println!("Sessions:   ws://localhost:{}/ws", config.bind_addr.port());
    println!();

    let pipeline = Pipeline::new(
        config,
        SyntheticCamera { tick: 0 },
        OrbitDetector { tick: 0 },
        RawEncoder,
        bus as Arc<dyn TelemetryBus>,
    );
    let outcome = pipeline.run().await?;

    std::process::exit(outcome.exit_code());
}
