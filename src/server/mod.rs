//! HTTP front end
//!
//! Two endpoints on one listener: `/stream` serves the MJPEG live feed and
//! `/ws` upgrades to a control session. The server participates in the
//! drain sequence through its shutdown watch: new connections stop being
//! accepted once the state leaves Running, while the in-flight stream and
//! session handlers end on their own.

pub mod config;

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::debug;

pub use config::ServerConfig;

use crate::error::Result;
use crate::frame::FrameCell;
use crate::session::{client, SessionContext, SessionRegistry};
use crate::shutdown::ShutdownState;
use crate::stream;

/// Shared handles every request handler needs
#[derive(Clone)]
pub struct ServerState {
    /// Latest-frame slot read by stream viewers
    pub cell: Arc<FrameCell>,
    /// Live control sessions
    pub registry: Arc<SessionRegistry>,
    /// Lifecycle watch; handlers end their work when it leaves Running
    pub shutdown: watch::Receiver<ShutdownState>,
    /// Handshake reply context
    pub context: SessionContext,
}

/// Build the application router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/stream", get(stream_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn stream_handler(State(state): State<ServerState>) -> Response {
    debug!("stream viewer connected");
    stream::mjpeg_response(Arc::clone(&state.cell), state.shutdown.clone())
}

async fn ws_handler(State(state): State<ServerState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| client::handle_socket(socket, state.registry, state.context))
}

/// Serve until the shutdown watch leaves the Running state
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<()> {
    let mut shutdown = state.shutdown.clone();
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while *shutdown.borrow_and_update() == ShutdownState::Running {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}
