//! Inbound request body fan-out.
//!
//! The inbound body can only be read once. A pump task reads it and hands a
//! cheap clone of every chunk to each target, so both targets see the exact
//! same bytes without the proxy holding the whole body.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, HttpBody};
use bytes::Bytes;
use futures_util::future::join;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

type Chunk = Result<Bytes, io::Error>;
type Sink = Option<mpsc::Sender<Chunk>>;

/// Split `body` into one outbound body per target.
///
/// A body known to be empty is not pumped; both sides get an empty body.
/// Must be called from within a Tokio runtime when the body is non-empty.
pub fn fan_out(body: Body, capacity: usize) -> [Body; 2] {
    if body.is_end_stream() {
        return [Body::empty(), Body::empty()];
    }

    let (tx_a, rx_a) = mpsc::channel(capacity);
    let (tx_b, rx_b) = mpsc::channel(capacity);
    tokio::spawn(pump(body, [Some(tx_a), Some(tx_b)]));

    [
        Body::from_stream(ChunkReceiver { rx: rx_a }),
        Body::from_stream(ChunkReceiver { rx: rx_b }),
    ]
}

async fn pump(body: Body, mut sinks: [Sink; 2]) {
    let mut stream = body.into_data_stream();
    let mut forwarded = 0u64;

    while let Some(item) = stream.next().await {
        let [a, b] = &mut sinks;
        match item {
            Ok(chunk) => {
                forwarded += chunk.len() as u64;
                // Both sides are offered the chunk at once; one slow reader
                // does not hold back the other's current chunk.
                join(offer(a, Ok(chunk.clone())), offer(b, Ok(chunk))).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Inbound request body read failed");
                let message = e.to_string();
                join(
                    offer(a, Err(io::Error::other(message.clone()))),
                    offer(b, Err(io::Error::other(message))),
                )
                .await;
                return;
            }
        }

        if sinks.iter().all(Option::is_none) {
            tracing::debug!(bytes = forwarded, "Both targets stopped reading request body");
            return;
        }
    }

    tracing::trace!(bytes = forwarded, "Request body forwarded");
}

/// Send `item` to one side, forgetting the side once its receiver is gone.
async fn offer(slot: &mut Sink, item: Chunk) {
    let Some(tx) = slot else { return };
    // Receiver gone: that attempt finished or was cancelled.
    if tx.send(item).await.is_err() {
        *slot = None;
    }
}

/// Receiving half of one target's body channel.
struct ChunkReceiver {
    rx: mpsc::Receiver<Chunk>,
}

impl Stream for ChunkReceiver {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        self.rx.poll_recv(cx)
    }
}
