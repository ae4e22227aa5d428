//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gathering.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overlay (secrets: SESSION_SECRET, QR_SECRET, ...)
//!     → validation.rs (semantic checks)
//!     → GatheringConfig (validated)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → server swaps keyring / password hash / token secrets (arc-swap)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal or absent config files
//! - Secrets come from the environment; a missing secret disables the
//!   feature that needs it instead of falling back to a built-in value
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_config_or_default, ConfigError};
pub use schema::{
    AuditConfig, Environment, ForwardedForPolicy, GatheringConfig, ListenerConfig, LogFormat,
    MailConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig, SessionConfig,
    TimeoutConfig, TlsConfig, TokenConfig,
};
