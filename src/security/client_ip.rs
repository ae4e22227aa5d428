//! Client address resolution.
//!
//! # Responsibilities
//! - Pick the address used for rate limiting and audit hashing
//! - Decide whether `X-Forwarded-For` is believed
//!
//! # Design Decisions
//! - Only the first forwarded entry is used; it is the original client
//!   when every hop appends
//! - Under `trusted_proxies`, the header counts only when the socket peer is
//!   a configured proxy. Without a known peer it is ignored.
//! - The result is an abuse-mitigation key, not an identity

use std::net::IpAddr;

use axum::http::HeaderMap;

use crate::config::{ForwardedForPolicy, RateLimitConfig};

/// Address used when nothing better is known.
pub const FALLBACK_IP: &str = "127.0.0.1";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    policy: ForwardedForPolicy,
    trusted_proxies: Vec<IpAddr>,
}

impl ClientIpResolver {
    pub fn new(policy: ForwardedForPolicy, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            policy,
            trusted_proxies,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.forwarded_for, config.trusted_proxies.clone())
    }

    /// Resolve the client address for a request.
    ///
    /// `peer` is the socket address, when the server was started with
    /// connect info.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> String {
        let forwarded = match self.policy {
            ForwardedForPolicy::Always => first_forwarded(headers),
            ForwardedForPolicy::TrustedProxies => peer
                .filter(|ip| self.trusted_proxies.contains(ip))
                .and_then(|_| first_forwarded(headers)),
            ForwardedForPolicy::Never => None,
        };

        forwarded
            .or_else(|| peer.map(|ip| ip.to_string()))
            .unwrap_or_else(|| FALLBACK_IP.to_string())
    }
}

fn first_forwarded(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::Ipv4Addr;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(value));
        headers
    }

    fn loopback() -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[test]
    fn test_always_uses_first_entry() {
        let resolver = ClientIpResolver::new(ForwardedForPolicy::Always, vec![]);
        assert_eq!(
            resolver.resolve(&forwarded(" 203.0.113.7 , 10.0.0.1"), None),
            "203.0.113.7"
        );
    }

    #[test]
    fn test_fallback_without_header_or_peer() {
        let resolver = ClientIpResolver::new(ForwardedForPolicy::Always, vec![]);
        assert_eq!(resolver.resolve(&HeaderMap::new(), None), FALLBACK_IP);
        assert_eq!(resolver.resolve(&forwarded("  "), None), FALLBACK_IP);
    }

    #[test]
    fn test_trusted_proxy_policy() {
        let resolver = ClientIpResolver::from_config(&RateLimitConfig::default());
        let headers = forwarded("198.51.100.4");

        assert_eq!(resolver.resolve(&headers, loopback()), "198.51.100.4");

        let stranger = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9)));
        assert_eq!(resolver.resolve(&headers, stranger), "192.0.2.9");
        assert_eq!(resolver.resolve(&headers, None), FALLBACK_IP);
    }

    #[test]
    fn test_never_ignores_header() {
        let resolver = ClientIpResolver::new(ForwardedForPolicy::Never, vec![]);
        let peer = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(resolver.resolve(&forwarded("1.2.3.4"), peer), "192.0.2.1");
    }
}
