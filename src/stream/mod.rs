//! MJPEG live stream
//!
//! Each HTTP viewer gets a `multipart/x-mixed-replace` response whose body
//! is an endless series of JPEG parts. Every viewer reads straight from the
//! shared [`FrameCell`](crate::frame::FrameCell): a slow viewer skips frames
//! instead of building a queue, and never slows the capture loop or the
//! other viewers down.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use tokio::sync::watch;
use tracing::debug;

use crate::frame::FrameCell;
use crate::shutdown::ShutdownState;

/// Multipart boundary token, fixed for the lifetime of the stream
const BOUNDARY: &str = "FRAME";

/// Frame one JPEG as a multipart part: boundary line, part headers with the
/// exact byte length, blank line, payload, trailing CRLF.
pub fn encode_part(frame: &Bytes) -> Bytes {
    let mut part = BytesMut::with_capacity(frame.len() + 128);
    part.put_slice(b"--");
    part.put_slice(BOUNDARY.as_bytes());
    part.put_slice(b"\r\nContent-Type: image/jpeg\r\nContent-Length: ");
    part.put_slice(frame.len().to_string().as_bytes());
    part.put_slice(b"\r\n\r\n");
    part.put_slice(frame);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// The stream of multipart parts behind one viewer's response body.
///
/// Ends when the frame source closes or the server leaves the Running
/// state; the transport then finishes the chunked body and the viewer sees
/// a normal end of stream.
fn part_stream(
    cell: Arc<FrameCell>,
    shutdown: watch::Receiver<ShutdownState>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        let mut last_seen = 0u64;
        let mut sent = 0usize;
        loop {
            if *shutdown.borrow() != ShutdownState::Running {
                break;
            }
            match cell.await_next(last_seen).await {
                Some((frame, sequence)) => {
                    last_seen = sequence;
                    sent += 1;
                    yield Ok(encode_part(&frame));
                }
                None => break,
            }
        }
        debug!(frames = sent, "stream ended");
    }
}

/// Build the complete streaming response for one viewer
pub fn mjpeg_response(
    cell: Arc<FrameCell>,
    shutdown: watch::Receiver<ShutdownState>,
) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                "multipart/x-mixed-replace; boundary=FRAME",
            ),
            (header::AGE, "0"),
            (header::CACHE_CONTROL, "no-cache, private"),
            (header::PRAGMA, "no-cache"),
        ],
        Body::from_stream(part_stream(cell, shutdown)),
    )
        .into_response()
}
