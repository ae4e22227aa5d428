//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatheringConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, overlay the environment, and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatheringConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatheringConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Like [`load_config`], but a missing file yields defaults plus the environment.
pub fn load_config_or_default(path: &Path) -> Result<GatheringConfig, ConfigError> {
    if path.exists() {
        return load_config(path);
    }

    tracing::info!(path = %path.display(), "Config file not found, using defaults");
    let mut config = GatheringConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay secrets and deployment settings from environment variables.
///
/// `lookup` abstracts `std::env::var` so tests can supply a fixed map.
/// Blank values are treated as absent.
pub fn apply_env_overrides<F>(config: &mut GatheringConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(env) = get("GATHERING_ENV") {
        match env.parse() {
            Ok(parsed) => config.environment = parsed,
            Err(e) => tracing::warn!(error = %e, "Ignoring GATHERING_ENV"),
        }
    }

    if let Some(secret) = get("SESSION_SECRET") {
        let mut keys = vec![secret];
        if let Some(previous) = get("SESSION_PREVIOUS_SECRETS") {
            keys.extend(
                previous
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );
        }
        config.session.signing_keys = keys;
    }

    if let Some(hash) = get("ADMIN_PASSWORD_HASH") {
        config.session.admin_password_hash = Some(hash);
    }

    if let Some(secret) = get("QR_SECRET") {
        config.tokens.secrets = vec![secret];
    }

    if let Some(salt) = get("IP_HASH_SALT") {
        config.audit.ip_hash_salt = Some(salt);
    }

    if let Some(key) = get("RESEND_API_KEY") {
        config.mail.api_key = Some(key);
    }
    if let Some(admin) = get("ADMIN_EMAIL") {
        config.mail.admin_address = Some(admin);
    }
    if let Some(from) = get("FROM_EMAIL") {
        config.mail.from_address = from;
    }
    if let Some(site) = get("SITE_URL") {
        config.mail.site_url = site;
    }
}
