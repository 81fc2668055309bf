//! Read-ahead buffer subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder accepts a response
//!     → pool.rs checkout (reuse idle buffer or allocate)
//!     → prefix bytes copied in, up to the buffer size
//!     → winner: frozen into Bytes and written to the client
//!       loser / failure: dropped
//!     → buffer cleared and returned to the idle queue
//! ```
//!
//! # Design Decisions
//! - Buffers are RAII guards; every exit path returns them
//! - Idle queue is lock-free and bounded, surplus buffers are freed
//! - A buffer never grows past the configured size

pub mod pool;

pub use pool::{BufferPool, PoolStats, PooledBuffer};
