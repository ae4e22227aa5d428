//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.
//! Secrets are normally left out of the file and supplied through the
//! environment overlay in `loader.rs`.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatheringConfig {
    /// Deployment environment (controls `Secure` cookies and CSP).
    pub environment: Environment,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Admin session signing and password verification.
    pub session: SessionConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// One-time token settings.
    pub tokens: TokenConfig,

    /// Audit log settings.
    pub audit: AuditConfig,

    /// Response hardening.
    pub security: SecurityConfig,

    /// Outbound email.
    pub mail: MailConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatheringConfig {
    /// Whether the service runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for one inbound request, in seconds.
    pub request_secs: u64,

    /// Deadline for each repository or mail call, in seconds.
    pub downstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            downstream_secs: 10,
        }
    }
}

/// Admin session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC signing keys. The first key signs; all keys verify.
    pub signing_keys: Vec<String>,

    /// Argon2 PHC string of the admin password.
    pub admin_password_hash: Option<String>,

    /// Session lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signing_keys: Vec::new(),
            admin_password_hash: None,
            ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// How far `X-Forwarded-For` is trusted when resolving the client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForwardedForPolicy {
    /// Always use the first forwarded entry.
    Always,
    /// Use the forwarded entry only when the peer is a trusted proxy.
    #[default]
    TrustedProxies,
    /// Ignore the header; use the socket peer.
    Never,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Only paths starting with this prefix are limited.
    pub path_prefix: String,

    /// Forwarded-for trust policy.
    pub forwarded_for: ForwardedForPolicy,

    /// Peers allowed to set `X-Forwarded-For` under `trusted_proxies`.
    pub trusted_proxies: Vec<IpAddr>,

    /// Interval between stale-record sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window_secs: 60,
            path_prefix: "/api/".to_string(),
            forwarded_for: ForwardedForPolicy::TrustedProxies,
            trusted_proxies: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
            sweep_interval_secs: 300,
        }
    }
}

/// One-time token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC secrets. The first secret signs; all secrets verify.
    pub secrets: Vec<String>,

    /// Token lifetime in seconds.
    pub ttl_secs: u64,

    /// Upper bound on remembered redeemed tokens.
    pub max_used_entries: usize,

    /// Interval between used-token sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secrets: Vec::new(),
            ttl_secs: 24 * 60 * 60,
            max_used_entries: 10_000,
            sweep_interval_secs: 60 * 60,
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable the audit log.
    pub enabled: bool,

    /// Directory holding one `<YYYY-MM-DD>.log` file per UTC day.
    pub directory: String,

    /// Salt for client address hashes. Without it no address hash is written.
    pub ip_hash_salt: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "logs".to_string(),
            ip_hash_salt: None,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 64 * 1024,
        }
    }
}

/// Outbound email configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    /// Endpoint of the transactional email API.
    pub api_url: String,

    /// API key. Without it messages are only logged.
    pub api_key: Option<String>,

    /// Sender address.
    pub from_address: String,

    /// Recipient of form-submission notifications.
    pub admin_address: Option<String>,

    /// Public site URL used in links.
    pub site_url: String,

    /// Retries for transient delivery failures (429, 5xx, connection errors).
    pub max_retries: u32,

    /// Base delay between delivery retries, in milliseconds.
    pub retry_base_ms: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from_address: "onboarding@resend.dev".to_string(),
            admin_address: None,
            site_url: "https://devgathering.in".to_string(),
            max_retries: 2,
            retry_base_ms: 200,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
