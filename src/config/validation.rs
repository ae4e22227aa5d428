//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, windows > 0, addresses parse)
//! - Keep the downstream deadline inside the request timeout
//! - Reject weak signing keys in production
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Missing secrets are not errors: the service starts and fails closed
//! - Runs before config is accepted into the system, including on reload

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatheringConfig;

/// Shortest signing key accepted in production, in bytes.
pub const MIN_PRODUCTION_KEY_LEN: usize = 32;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic problems.
pub fn validate_config(config: &GatheringConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.downstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.downstream_secs", "must be greater than 0"));
    } else if config.timeouts.downstream_secs >= config.timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.downstream_secs",
            "must be less than timeouts.request_secs",
        ));
    }

    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::new("session.ttl_secs", "must be greater than 0"));
    }

    let limits = &config.rate_limit;
    if limits.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if limits.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if !limits.path_prefix.starts_with('/') {
        errors.push(ValidationError::new("rate_limit.path_prefix", "must start with '/'"));
    }
    if limits.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
    }

    if config.tokens.ttl_secs == 0 {
        errors.push(ValidationError::new("tokens.ttl_secs", "must be greater than 0"));
    }
    if config.tokens.max_used_entries == 0 {
        errors.push(ValidationError::new("tokens.max_used_entries", "must be greater than 0"));
    }
    if config.tokens.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("tokens.sweep_interval_secs", "must be greater than 0"));
    }

    if config.audit.enabled && config.audit.directory.trim().is_empty() {
        errors.push(ValidationError::new("audit.directory", "must not be empty when audit is enabled"));
    }

    if url::Url::parse(&config.mail.api_url).is_err() {
        errors.push(ValidationError::new("mail.api_url", "is not a valid URL"));
    }
    if url::Url::parse(&config.mail.site_url).is_err() {
        errors.push(ValidationError::new("mail.site_url", "is not a valid URL"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.is_production() {
        for (i, key) in config.session.signing_keys.iter().enumerate() {
            if key.len() < MIN_PRODUCTION_KEY_LEN {
                errors.push(ValidationError::new(
                    format!("session.signing_keys[{i}]"),
                    format!("must be at least {MIN_PRODUCTION_KEY_LEN} bytes in production"),
                ));
            }
        }
        for (i, secret) in config.tokens.secrets.iter().enumerate() {
            if secret.len() < MIN_PRODUCTION_KEY_LEN {
                errors.push(ValidationError::new(
                    format!("tokens.secrets[{i}]"),
                    format!("must be at least {MIN_PRODUCTION_KEY_LEN} bytes in production"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Names of secrets that are absent. The service still starts, but the
/// dependent features deny every request.
pub fn missing_secrets(config: &GatheringConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if config.session.signing_keys.is_empty() {
        missing.push("session.signing_keys (SESSION_SECRET)");
    }
    if config.session.admin_password_hash.is_none() {
        missing.push("session.admin_password_hash (ADMIN_PASSWORD_HASH)");
    }
    if config.tokens.secrets.is_empty() {
        missing.push("tokens.secrets (QR_SECRET)");
    }
    if config.audit.enabled && config.audit.ip_hash_salt.is_none() {
        missing.push("audit.ip_hash_salt (IP_HASH_SALT)");
    }
    missing
}
