//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line arguments merged on top (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    BufferConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    RequestBodyConfig, TargetsConfig, TimeoutConfig,
};
pub use validation::{normalize_listen_addr, resolve_listen_addr, validate_config, ValidationError};
