//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP front end produces:
//!     → logging.rs (structured log events, request spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a race via its span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
