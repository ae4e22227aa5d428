//! The `admin_session` cookie.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::GatheringConfig;

pub const SESSION_COOKIE: &str = "admin_session";

/// Builds `Set-Cookie` values for the admin session.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookie {
    secure: bool,
    max_age: Duration,
}

impl SessionCookie {
    pub fn new(secure: bool, max_age: Duration) -> Self {
        Self { secure, max_age }
    }

    /// `Secure` only in production.
    pub fn from_config(config: &GatheringConfig) -> Self {
        Self::new(
            config.is_production(),
            Duration::from_secs(config.session.ttl_secs),
        )
    }

    fn attributes(&self, max_age_secs: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!("HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_secs}{secure}")
    }

    /// Cookie carrying a fresh session token.
    pub fn issue(&self, token: &str) -> Result<HeaderValue, header::InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{SESSION_COOKIE}={token}; {}",
            self.attributes(self.max_age.as_secs())
        ))
    }

    /// Expired cookie that logs the browser out.
    pub fn destroy_session(&self) -> HeaderValue {
        let value = format!(
            "{SESSION_COOKIE}=; {}; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.attributes(0)
        );
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("admin_session=; Max-Age=0; Path=/"))
    }
}

/// Read the session token from any `Cookie` header.
pub fn read_session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
