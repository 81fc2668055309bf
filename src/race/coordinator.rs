//! Race Coordinator: two forwarders, first acceptable response wins.
//!
//! # Protocol
//! - Both attempts start at once, each with its own cancellation token
//! - The first `Success` to arrive wins and the other side is cancelled
//! - A `Failure` only ends the race once the other side has failed too
//! - Outcomes arriving after the race is decided are dropped, which
//!   returns their buffer and closes their upstream body

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::buffer::BufferPool;
use crate::net::UpstreamClient;
use crate::race::fanout::fan_out;
use crate::race::forwarder::{Failure, FailureReason, Forwarder, Success};
use crate::race::target::{Side, Target};

/// The winning attempt of a race.
#[derive(Debug)]
pub struct Winner {
    pub side: Side,
    pub target: String,
    pub success: Success,
}

/// Terminal state of one race.
#[derive(Debug)]
pub enum RaceOutcome {
    Won(Winner),
    /// Both targets failed, in arrival order.
    BothFailed([Failure; 2]),
}

/// Races every request against two targets.
///
/// Cheap to clone; holds only shared handles.
#[derive(Clone)]
pub struct Race {
    forwarders: [Forwarder; 2],
    body_channel_capacity: usize,
}

impl Race {
    pub fn new(
        targets: [Arc<Target>; 2],
        client: UpstreamClient,
        pool: BufferPool,
        body_channel_capacity: usize,
    ) -> Self {
        let [a, b] = targets;
        Self {
            forwarders: [
                Forwarder::new(a, client.clone(), pool.clone()),
                Forwarder::new(b, client, pool),
            ],
            body_channel_capacity,
        }
    }

    pub fn target(&self, side: Side) -> &Target {
        self.forwarders[side.index()].target()
    }

    /// Run one race for `request`.
    ///
    /// Dropping the returned future cancels both attempts.
    pub async fn run(&self, request: Request<Body>) -> RaceOutcome {
        let (parts, body) = request.into_parts();
        let bodies = fan_out(body, self.body_channel_capacity);

        let race_token = CancellationToken::new();
        let _cancel_on_exit = race_token.clone().drop_guard();
        let tokens = [race_token.child_token(), race_token.child_token()];

        // Room for both outcomes so a late sender never blocks.
        let (tx, mut rx) = mpsc::channel::<(Side, Result<Success, Failure>)>(2);

        for ((side, forwarder), body) in [Side::A, Side::B]
            .into_iter()
            .zip(self.forwarders.iter())
            .zip(bodies)
        {
            let outbound = forwarder.build_request(&parts, body);
            let forwarder = forwarder.clone();
            let cancel = tokens[side.index()].clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let outcome = match outbound {
                    Ok(request) => forwarder.forward(request, cancel).await,
                    Err(e) => Err(forwarder.failure(FailureReason::Request(e))),
                };
                // Receiver gone means the race is decided; the outcome drops here.
                let _ = tx.send((side, outcome)).await;
            });
        }
        drop(tx);

        let mut first_failure: Option<Failure> = None;
        while let Some((side, outcome)) = rx.recv().await {
            match outcome {
                Ok(success) => {
                    let loser = side.other();
                    tracing::info!(
                        status = success.status.as_u16(),
                        winner = %side,
                        "Got {} response from {}, cancelling {}",
                        success.status.as_u16(),
                        side,
                        loser
                    );
                    tokens[loser.index()].cancel();

                    return RaceOutcome::Won(Winner {
                        side,
                        target: self.target(side).to_string(),
                        success,
                    });
                }
                Err(failure) => match first_failure.take() {
                    None => first_failure = Some(failure),
                    Some(first) => {
                        tracing::warn!(first = %first, second = %failure, "Both targets failed");
                        return RaceOutcome::BothFailed([first, failure]);
                    }
                },
            }
        }

        // Only reachable if a forwarder task panicked before reporting.
        tracing::error!("Forwarder task ended without an outcome");
        let missing = |side: Side| Failure {
            side,
            target: self.target(side).to_string(),
            reason: FailureReason::Cancelled,
        };
        match first_failure {
            Some(first) => {
                let other = missing(first.side.other());
                RaceOutcome::BothFailed([first, other])
            }
            None => RaceOutcome::BothFailed([missing(Side::A), missing(Side::B)]),
        }
    }
}
