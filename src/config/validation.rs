//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses and target URLs
//! - Validate value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::io;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::race::{Side, Target};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field} address {value:?}")]
    Address { field: &'static str, value: String },
    #[error("target {side} is not set")]
    MissingTarget { side: &'static str },
    #[error("target {side}: {message}")]
    Target { side: &'static str, message: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Normalise a `host:port` listen address.
///
/// The host may be an IP literal (IPv6 in brackets) or a name to resolve
/// later. An empty host, as in `:8080`, means all interfaces.
pub fn normalize_listen_addr(raw: &str) -> Option<String> {
    let (host, port) = raw.trim().rsplit_once(':')?;
    port.parse::<u16>().ok()?;

    let bracketed = host.starts_with('[') && host.ends_with(']');
    if host.contains(':') && !bracketed {
        return None;
    }
    if host.chars().any(char::is_whitespace) {
        return None;
    }

    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Some(format!("{host}:{port}"))
}

/// Resolve a listen address to the first socket address it names.
pub async fn resolve_listen_addr(raw: &str) -> io::Result<SocketAddr> {
    let addr = normalize_listen_addr(raw).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("invalid listen address {raw:?}"))
    })?;
    let resolved = tokio::net::lookup_host(addr.as_str())
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{addr} resolved to nothing")));
    resolved
}

/// Validate `config`, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if normalize_listen_addr(&config.listener.bind_address).is_none() {
        errors.push(ValidationError::Address {
            field: "listener",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && normalize_listen_addr(&config.observability.metrics_address).is_none()
    {
        errors.push(ValidationError::Address {
            field: "metrics",
            value: config.observability.metrics_address.clone(),
        });
    }

    for (side, raw) in [(Side::A, &config.targets.a), (Side::B, &config.targets.b)] {
        if raw.trim().is_empty() {
            errors.push(ValidationError::MissingTarget { side: side.as_str() });
        } else if let Err(e) = Target::parse(side, raw) {
            errors.push(ValidationError::Target {
                side: side.as_str(),
                message: e.to_string(),
            });
        }
    }

    if config.buffers.size == 0 {
        errors.push(ValidationError::Zero { field: "buffers.size" });
    }
    if config.buffers.max_idle == 0 {
        errors.push(ValidationError::Zero { field: "buffers.max_idle" });
    }
    if config.request_body.channel_capacity == 0 {
        errors.push(ValidationError::Zero {
            field: "request_body.channel_capacity",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
