//! Outbound network layer.
//!
//! # Data Flow
//! ```text
//! Forwarder request (absolute URI)
//!     → connector.rs (TCP connect via HttpConnector)
//!     → tls.rs (rustls handshake, https targets only)
//!     → hyper-util legacy client (HTTP/1.1, no idle connections kept)
//! ```
//!
//! # Design Decisions
//! - The request URI is sent as built, never re-parsed or normalised
//! - Every attempt opens its own connection so cancelling it closes the socket

pub mod connector;
pub mod tls;

pub use connector::{build_client, UpstreamClient, UpstreamConnector, UpstreamStream};
pub use tls::load_client_config;
