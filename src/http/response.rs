//! Response Emitter: commit a race winner to the client.
//!
//! # Responsibilities
//! - Copy every upstream header, repeated names included
//! - Set the winning status
//! - Send the read-ahead prefix, then stream the rest of the upstream body
//!
//! # Design Decisions
//! - Once headers are out the status cannot change; a failed client write
//!   is logged and the copy abandoned
//! - The pooled buffer and the upstream body are owned by the response body,
//!   so both are released however the response ends

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::http::Response;
use bytes::Bytes;
use futures_util::Stream;

use crate::buffer::PooledBuffer;
use crate::race::forwarder::UpstreamBody;
use crate::race::Winner;

/// Build the client response for a race winner.
pub fn emit(winner: Winner) -> Response<Body> {
    let Winner {
        side,
        target,
        success,
    } = winner;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = success.status;
    *response.headers_mut() = success.headers;

    *response.body_mut() = Body::from_stream(EmitBody::new(
        success.prefix,
        success.spill,
        success.rest,
        success.complete,
        format!("{side} ({target})"),
    ));
    response
}

/// Client-bound body: buffered prefix first, then the live upstream stream.
pub struct EmitBody {
    prefix: Option<Bytes>,
    spill: Option<Bytes>,
    rest: Option<UpstreamBody>,
    /// Bytes handed over after the prefix.
    copied: u64,
    finished: bool,
    upstream: String,
}

impl EmitBody {
    fn new(
        prefix: PooledBuffer,
        spill: Option<Bytes>,
        rest: UpstreamBody,
        complete: bool,
        upstream: String,
    ) -> Self {
        // An empty prefix has nothing to send; dropping it returns the buffer now.
        let prefix = (!prefix.is_empty()).then(|| prefix.freeze());
        let rest = (!complete).then_some(rest);
        // Nothing left to write: hyper may drop the body unpolled (HEAD, 204,
        // 304) without anything having failed.
        let finished = prefix.is_none() && spill.is_none() && rest.is_none();

        Self {
            prefix,
            spill,
            rest,
            copied: 0,
            finished,
            upstream,
        }
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            tracing::debug!(upstream = %self.upstream, copied = self.copied, "Response body copied");
        }
    }
}

impl Stream for EmitBody {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(prefix) = self.prefix.take() {
            return Poll::Ready(Some(Ok(prefix)));
        }
        if let Some(spill) = self.spill.take() {
            self.copied += spill.len() as u64;
            return Poll::Ready(Some(Ok(spill)));
        }

        let Some(rest) = self.rest.as_mut() else {
            self.finish();
            return Poll::Ready(None);
        };

        match ready!(rest.as_mut().poll_next(cx)) {
            Some(Ok(chunk)) => {
                self.copied += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                tracing::warn!(upstream = %self.upstream, error = %e, copied = self.copied, "Upstream body read error");
                self.rest = None;
                self.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                self.rest = None;
                self.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for EmitBody {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                upstream = %self.upstream,
                copied = self.copied,
                "Client write failed, response abandoned"
            );
        }
    }
}
