//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP endpoints to
    pub bind_addr: SocketAddr,

    /// Camera device index handed to the capture backend
    pub camera_index: u32,

    /// Pause after signaling drain, before waiting on workers, so loops
    /// blocked in a camera grab can observe the state change
    pub settle: Duration,

    /// Maximum wait for workers to quiesce during drain
    pub grace: Duration,

    /// Interval between frame-rate reports to control sessions
    pub report_interval: Duration,

    /// Directory of served UI assets, covered by the content digest
    /// (None = nothing served, digest of an empty tree)
    pub asset_dir: Option<PathBuf>,

    /// Version string announced to clients in the `meta` reply
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".parse().unwrap(),
            camera_index: 0,
            settle: Duration::from_millis(300),
            grace: Duration::from_secs(1),
            report_interval: Duration::from_secs(1),
            asset_dir: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the camera device index
    pub fn camera_index(mut self, index: u32) -> Self {
        self.camera_index = index;
        self
    }

    /// Set the post-drain settle window
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the drain grace period
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Set the frame-rate report interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the served asset directory
    pub fn asset_dir(mut self, dir: PathBuf) -> Self {
        self.asset_dir = Some(dir);
        self
    }

    /// Set the announced version string
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
