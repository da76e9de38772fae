//! Per-connection session handling
//!
//! A session is two tasks: the receive loop (this module's `handle_socket`,
//! which also owns registration) and a dedicated sender task draining the
//! mailbox into the socket. Inbound messages are dispatched on their `_t`
//! tag; unrecognized kinds are logged and ignored, never fatal.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::digest::content_digest;
use super::message::{self, Envelope};
use super::registry::SessionRegistry;

/// Item in a session's outbound mailbox
#[derive(Debug)]
pub enum Outbound {
    /// JSON envelope to send as a text frame
    Message(Envelope),
    /// Close the connection after draining prior messages
    Close,
}

/// Immutable per-server context the dispatch table needs
#[derive(Clone)]
pub struct SessionContext {
    /// Version string announced in `meta`
    pub version: String,
    /// Served asset directory; the `hash` reply digests it afresh on every
    /// handshake, so edited assets are noticed without a restart
    pub asset_dir: Option<PathBuf>,
}

/// Run one session to completion: register, pump, unregister.
///
/// Unregistration runs on every exit path, including cancellation at any
/// await point, because it happens after the pump future completes or is
/// dropped along with the socket.
pub(crate) async fn handle_socket(
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
    context: SessionContext,
) {
    let (outbox, mailbox) = mpsc::unbounded_channel();
    let id = registry.register(outbox.clone()).await;
    debug!(session_id = id, "session opened");

    let (sink, stream) = socket.split();
    let sender = tokio::spawn(send_loop(id, sink, mailbox));

    receive_loop(id, stream, &outbox, &context).await;

    registry.unregister(id).await;
    // Dropping our outbox closes the mailbox once broadcasts in flight are
    // drained, which ends the sender task.
    drop(outbox);
    let _ = sender.await;
    debug!(session_id = id, "session closed");
}

async fn send_loop(
    id: u64,
    mut sink: SplitSink<WebSocket, Message>,
    mut mailbox: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = mailbox.recv().await {
        match item {
            Outbound::Message(envelope) => {
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(session_id = id, error = %e, "unserializable envelope");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    // Routine: the client went away. Tear down only this
                    // session by abandoning its mailbox.
                    debug!(session_id = id, error = %e, "send failed");
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

async fn receive_loop(
    id: u64,
    mut stream: SplitStream<WebSocket>,
    outbox: &mpsc::UnboundedSender<Outbound>,
    context: &SessionContext,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => dispatch(id, &text, outbox, context),
            Ok(Message::Binary(data)) => {
                debug!(session_id = id, bytes = data.len(), "binary message ignored")
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong handled by the transport
            Err(e) => {
                debug!(session_id = id, error = %e, "receive error");
                break;
            }
        }
    }
}

/// Dispatch one inbound message by its `_t` tag
fn dispatch(
    id: u64,
    text: &str,
    outbox: &mpsc::UnboundedSender<Outbound>,
    context: &SessionContext,
) {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(session_id = id, error = %e, "bad message");
            return;
        }
    };

    match envelope.kind.as_str() {
        "auth" => {
            info!(
                session_id = id,
                uuid = envelope.field("uuid").and_then(|v| v.as_str()).unwrap_or("?"),
                "client handshake"
            );
            // meta, then hash, before any other outbound traffic
            let _ = outbox.send(Outbound::Message(message::meta(&context.version)));
            let digest = content_digest(context.asset_dir.as_deref());
            let _ = outbox.send(Outbound::Message(message::hash(&digest)));
        }
        kind => {
            warn!(session_id = id, kind, "no handler for message kind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionContext {
        SessionContext {
            version: "0.2.0".into(),
            asset_dir: None,
        }
    }

    fn expect_message(out: Option<Outbound>) -> Envelope {
        match out {
            Some(Outbound::Message(env)) => env,
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auth_replies_meta_then_hash_first() {
        let (outbox, mut mailbox) = mpsc::unbounded_channel();

        dispatch(1, r#"{"_t":"auth","uuid":"client-7"}"#, &outbox, &context());

        let first = expect_message(mailbox.recv().await);
        let second = expect_message(mailbox.recv().await);
        assert_eq!(first.kind, "meta");
        assert_eq!(first.field("ver").unwrap(), "0.2.0");
        assert_eq!(second.kind, "hash");
        assert_eq!(
            second.field("data").and_then(|v| v.as_str()),
            Some(content_digest(None).as_str())
        );
        assert!(mailbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_hash_reflects_asset_changes_between_handshakes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("index.html")).unwrap();
        let context = SessionContext {
            version: "0.2.0".into(),
            asset_dir: Some(dir.path().to_path_buf()),
        };
        let (outbox, mut mailbox) = mpsc::unbounded_channel();

        dispatch(1, r#"{"_t":"auth","uuid":"a"}"#, &outbox, &context);
        let _meta = expect_message(mailbox.recv().await);
        let before = expect_message(mailbox.recv().await);

        // Asset set changes while the server keeps running
        std::fs::File::create(dir.path().join("panel.js")).unwrap();

        dispatch(1, r#"{"_t":"auth","uuid":"a"}"#, &outbox, &context);
        let _meta = expect_message(mailbox.recv().await);
        let after = expect_message(mailbox.recv().await);

        assert_ne!(before.field("data"), after.field("data"));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_ignored() {
        let (outbox, mut mailbox) = mpsc::unbounded_channel();

        dispatch(1, r#"{"_t":"warp-drive"}"#, &outbox, &context());
        dispatch(1, "not json at all", &outbox, &context());

        assert!(mailbox.try_recv().is_err());
    }
}
