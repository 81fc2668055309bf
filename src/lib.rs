//! Redundant-request reverse proxy library.
//!
//! Every inbound request is raced against two upstream targets; the first
//! acceptable response is streamed back and the other attempt is cancelled.

pub mod buffer;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod race;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use race::{Race, RaceOutcome};
