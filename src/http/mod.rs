//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request span, metrics)
//!     → request.rs (request ID)
//!     → race engine (crate::race)
//!     → response.rs (winner headers, prefix, streamed remainder)
//!       or an empty 503 when both targets failed
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, X_REQUEST_ID};
pub use response::{emit, EmitBody};
pub use server::{AppState, HttpServer, ServerError};
