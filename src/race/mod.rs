//! Race-and-forward engine.
//!
//! # Data Flow
//! ```text
//! inbound Request<Body>
//!     → coordinator.rs (split request, spawn two attempts)
//!     → fanout.rs (inbound body teed to both targets)
//!     → forwarder.rs ×2 (rewrite authority, execute, classify,
//!                        capture read-ahead prefix)
//!     → coordinator.rs (first Success wins, other side cancelled;
//!                       two Failures end the race)
//!     → RaceOutcome handed to the HTTP front end
//! ```
//!
//! # Design Decisions
//! - Tasks report over one channel; no state is shared between them
//! - Cancellation drops the in-flight future so the socket is closed
//! - Upstream connections are never reused across attempts
//! - Nothing about a target's failure reaches the client

pub mod coordinator;
pub mod fanout;
pub mod forwarder;
pub mod target;

pub use coordinator::{Race, RaceOutcome, Winner};
pub use forwarder::{is_acceptable, Failure, FailureReason, Forwarder, Success};
pub use target::{Side, Target, TargetError};
