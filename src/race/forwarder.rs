//! Target Forwarder: one upstream attempt, classified.
//!
//! # Responsibilities
//! - Clone the inbound request for one target (authority rewritten only)
//! - Execute it on a fresh, non-reusable connection
//! - Classify the response as acceptable or not
//! - Capture the read-ahead prefix of an acceptable body
//! - Drain and discard the body of an unacceptable one
//!
//! Every I/O step is raced against the attempt's cancellation token.
//! Cancelling drops the in-flight future, which closes the socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, Request, StatusCode};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::buffer::{BufferPool, PooledBuffer};
use crate::net::UpstreamClient;
use crate::race::target::{Side, Target};

/// Remaining upstream body after the read-ahead prefix.
pub type UpstreamBody = BoxStream<'static, Result<Bytes, axum::Error>>;

/// An acceptable response, ready to be committed to the client.
pub struct Success {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// First bytes of the body, at most the pool's buffer size.
    pub prefix: PooledBuffer,
    /// Part of the last prefix read that did not fit in the buffer.
    pub spill: Option<Bytes>,
    /// The still-open upstream body.
    pub rest: UpstreamBody,
    /// True when end-of-stream was seen while filling the prefix.
    pub complete: bool,
}

impl std::fmt::Debug for Success {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Success")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("prefix", &self.prefix)
            .field("spill", &self.spill.as_ref().map(Bytes::len))
            .field("complete", &self.complete)
            .finish_non_exhaustive()
    }
}

/// Why an attempt did not produce a [`Success`].
#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error("invalid outbound request: {0}")]
    Request(#[source] axum::http::Error),
    #[error("network error: {0}")]
    Network(#[source] hyper_util::client::legacy::Error),
    #[error("unsatisfying status {0}")]
    BadStatus(StatusCode),
    #[error("body read error: {0}")]
    BodyRead(#[source] axum::Error),
    #[error("cancelled")]
    Cancelled,
}

impl FailureReason {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::Request(_) => "request",
            FailureReason::Network(_) => "network",
            FailureReason::BadStatus(_) => "bad_status",
            FailureReason::BodyRead(_) => "body_read",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

/// A failed attempt against one target.
#[derive(Debug, thiserror::Error)]
#[error("target {target} failed: {reason}")]
pub struct Failure {
    pub side: Side,
    pub target: String,
    #[source]
    pub reason: FailureReason,
}

/// Whether a response may win the race.
///
/// Server errors and 408 are rejected; everything else, 404 included, is
/// the application's answer and gets passed through.
pub fn is_acceptable(status: StatusCode) -> bool {
    !(status.is_server_error() || status.as_u16() >= 600 || status == StatusCode::REQUEST_TIMEOUT)
}

/// Runs attempts against a single target.
#[derive(Clone)]
pub struct Forwarder {
    target: Arc<Target>,
    client: UpstreamClient,
    pool: BufferPool,
}

impl Forwarder {
    pub fn new(target: Arc<Target>, client: UpstreamClient, pool: BufferPool) -> Self {
        Self {
            target,
            client,
            pool,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Build the outbound clone of `parts` for this target.
    pub fn build_request(
        &self,
        parts: &Parts,
        body: Body,
    ) -> Result<Request<Body>, axum::http::Error> {
        let mut request = Request::new(body);
        *request.method_mut() = parts.method.clone();
        *request.uri_mut() = self.target.rewrite(&parts.uri)?;

        let headers = request.headers_mut();
        for (name, value) in parts.headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

        Ok(request)
    }

    /// Run one attempt to completion or cancellation.
    ///
    /// Produces exactly one outcome and never retries.
    pub async fn forward(
        &self,
        request: Request<Body>,
        cancel: CancellationToken,
    ) -> Result<Success, Failure> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FailureReason::Cancelled),
            result = self.attempt(request) => result,
        };

        result.map_err(|reason| self.failure(reason))
    }

    /// Log `reason` and attribute it to this target.
    pub fn failure(&self, reason: FailureReason) -> Failure {
        match &reason {
            FailureReason::Cancelled => {
                tracing::debug!(upstream = %self.target, "Attempt cancelled");
            }
            FailureReason::BadStatus(status) => {
                tracing::info!(upstream = %self.target, status = status.as_u16(), "Target returned unsatisfying status");
            }
            reason => {
                tracing::warn!(upstream = %self.target, error = %reason, "Target failed");
            }
        }
        Failure {
            side: self.target.side(),
            target: self.target.to_string(),
            reason,
        }
    }

    async fn attempt(&self, request: Request<Body>) -> Result<Success, FailureReason> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(FailureReason::Network)?;

        let (parts, incoming) = response.into_parts();
        let status = parts.status;
        let headers = parts.headers;
        let mut body: UpstreamBody = Body::new(incoming).into_data_stream().boxed();

        if !is_acceptable(status) {
            let drained = drain(&mut body).await;
            tracing::trace!(upstream = %self.target, bytes = drained, "Drained rejected body");
            return Err(FailureReason::BadStatus(status));
        }

        let mut prefix = self.pool.checkout();
        // On error `prefix` drops here and goes back to the pool unfilled.
        let (spill, complete) = read_prefix(&mut body, &mut prefix)
            .await
            .map_err(FailureReason::BodyRead)?;

        Ok(Success {
            status,
            headers,
            prefix,
            spill,
            rest: body,
            complete,
        })
    }
}

/// Fill `buf` from `body` until it is full or the body ends.
///
/// Reaching the end first is not an error. Returns the unconsumed tail of the
/// final chunk, if any, and whether the body ended.
pub(crate) async fn read_prefix<S, E>(
    body: &mut S,
    buf: &mut PooledBuffer,
) -> Result<(Option<Bytes>, bool), E>
where
    S: futures_util::Stream<Item = Result<Bytes, E>> + Unpin,
{
    while !buf.is_full() {
        match body.next().await {
            Some(Ok(chunk)) => {
                let taken = buf.fill_from(&chunk);
                if taken < chunk.len() {
                    return Ok((Some(chunk.slice(taken..)), false));
                }
            }
            Some(Err(e)) => return Err(e),
            None => return Ok((None, true)),
        }
    }
    Ok((None, false))
}

/// Read `body` to exhaustion, discarding it. Stops at the first error.
async fn drain<S, E>(body: &mut S) -> u64
where
    S: futures_util::Stream<Item = Result<Bytes, E>> + Unpin,
{
    let mut total = 0u64;
    while let Some(Ok(chunk)) = body.next().await {
        total += chunk.len() as u64;
    }
    total
}
