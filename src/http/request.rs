//! Inbound request helpers.
//!
//! # Responsibilities
//! - Pick a request ID for log correlation
//! - Build the per-request tracing span
//!
//! # Design Decisions
//! - An inbound `x-request-id` is reused; otherwise a UUID v4 is generated
//! - The ID lives only in the span; forwarded headers are left untouched

use axum::http::HeaderMap;
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID from the inbound headers, or a fresh UUID.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
