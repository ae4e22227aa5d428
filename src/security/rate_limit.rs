//! Rolling-window rate limiting.
//!
//! # Responsibilities
//! - Count requests per client fingerprint inside a window anchored at the
//!   client's first request
//! - Reject with 429 once the budget is spent
//! - Prune records whose window has elapsed
//!
//! # Design Decisions
//! - State lives behind `RateLimitStore` so a shared cache can replace the
//!   in-memory map in multi-process deployments
//! - The key is a 32-bit rolling hash of the address; collisions only merge
//!   two clients' budgets
//! - Updates for one key happen under that key's entry lock

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use std::net::SocketAddr;

use crate::audit::{AuditEvent, AuditLogger};
use crate::clock::now_millis;
use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::client_ip::ClientIpResolver;

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Counter state for one fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    pub count: u32,
    pub window_start_ms: u64,
}

/// Storage for per-client window records.
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` and decide. Must be atomic per key.
    fn hit(&self, key: u32, now_ms: u64, max_requests: u32, window_ms: u64) -> RateDecision;

    /// Drop records whose window elapsed. Returns how many were removed.
    fn sweep(&self, now_ms: u64, window_ms: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-process store.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    records: DashMap<u32, WindowRecord>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: u32) -> Option<WindowRecord> {
        self.records.get(&key).map(|r| *r)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn hit(&self, key: u32, now_ms: u64, max_requests: u32, window_ms: u64) -> RateDecision {
        let mut entry = self.records.entry(key).or_insert(WindowRecord {
            count: 0,
            window_start_ms: now_ms,
        });
        let record = entry.value_mut();
        let elapsed = now_ms.saturating_sub(record.window_start_ms);

        if record.count == 0 || elapsed > window_ms {
            *record = WindowRecord {
                count: 1,
                window_start_ms: now_ms,
            };
            return RateDecision::Allowed {
                remaining: max_requests.saturating_sub(1),
            };
        }

        if record.count >= max_requests {
            return RateDecision::Limited {
                retry_after: Duration::from_millis(window_ms.saturating_sub(elapsed)),
            };
        }

        record.count += 1;
        RateDecision::Allowed {
            remaining: max_requests - record.count,
        }
    }

    fn sweep(&self, now_ms: u64, window_ms: u64) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| now_ms.saturating_sub(record.window_start_ms) <= window_ms);
        before.saturating_sub(self.records.len())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Non-cryptographic 32-bit fingerprint: `h = h * 31 + unit` over UTF-16 units.
pub fn fingerprint(ip: &str) -> u32 {
    ip.encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)))
}

/// Rate limiter bound to one budget.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Arc::new(MemoryRateLimitStore::new()),
            config.max_requests,
            Duration::from_secs(config.window_secs),
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn check(&self, ip: &str) -> RateDecision {
        self.check_at(ip, now_millis())
    }

    pub fn check_at(&self, ip: &str, now_ms: u64) -> RateDecision {
        self.store.hit(
            fingerprint(ip),
            now_ms,
            self.max_requests,
            self.window.as_millis() as u64,
        )
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(now_millis())
    }

    pub fn sweep_at(&self, now_ms: u64) -> usize {
        self.store.sweep(now_ms, self.window.as_millis() as u64)
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }
}

/// State for [`rate_limit_middleware`].
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub resolver: Arc<ClientIpResolver>,
    pub path_prefix: Arc<str>,
    pub audit: Arc<AuditLogger>,
}

/// The 429 response. Security headers are added by the outer layers.
pub fn too_many_requests(window: Duration) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": RATE_LIMITED_MESSAGE })),
    )
        .into_response();
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(window.as_secs()),
    );
    response
}

/// Middleware applying the limiter to paths under the configured prefix.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !request.uri().path().starts_with(&*state.path_prefix) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = state.resolver.resolve(request.headers(), peer);

    match state.limiter.check(&ip) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            let path = request.uri().path().to_string();
            tracing::warn!(
                path = %path,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            state
                .audit
                .log_event(AuditEvent::RateLimited, json!({ "path": path }), Some(&ip));
            too_many_requests(state.limiter.window())
        }
    }
}

/// Periodically prune elapsed windows until shutdown.
pub async fn run_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.tracked_clients(), "Swept rate limit records");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryRateLimitStore::new()),
            max,
            Duration::from_secs(window_secs),
        )
    }

    #[test]
    fn test_fingerprint_matches_rolling_hash() {
        assert_eq!(fingerprint(""), 0);
        assert_eq!(fingerprint("a"), 97);
        assert_eq!(fingerprint("ab"), 97 * 31 + 98);
        assert_ne!(fingerprint("10.0.0.1"), fingerprint("10.0.0.2"));
    }

    #[test]
    fn test_max_requests_then_limited() {
        let limiter = limiter(10, 60);
        let start = 1_000_000;

        for i in 0..10 {
            assert_eq!(
                limiter.check_at("1.2.3.4", start + i),
                RateDecision::Allowed {
                    remaining: 9 - i as u32
                }
            );
        }
        assert!(!limiter.check_at("1.2.3.4", start + 10).is_allowed());
        assert!(limiter.check_at("5.6.7.8", start + 10).is_allowed());
    }

    #[test]
    fn test_retry_after_is_remaining_window() {
        let limiter = limiter(1, 60);
        assert!(limiter.check_at("ip", 0).is_allowed());
        assert_eq!(
            limiter.check_at("ip", 15_000),
            RateDecision::Limited {
                retry_after: Duration::from_secs(45)
            }
        );
    }

    #[test]
    fn test_window_anchored_at_first_request() {
        let limiter = limiter(2, 60);
        assert!(limiter.check_at("ip", 10_000).is_allowed());
        assert!(limiter.check_at("ip", 50_000).is_allowed());
        assert!(!limiter.check_at("ip", 70_000).is_allowed());
        // Exactly one window after the anchor is still inside it.
        assert!(!limiter.check_at("ip", 70_000).is_allowed());
        assert!(limiter.check_at("ip", 70_001).is_allowed());
    }

    #[test]
    fn test_sweep_removes_elapsed_windows() {
        let limiter = limiter(5, 60);
        limiter.check_at("old", 0);
        limiter.check_at("new", 50_000);

        assert_eq!(limiter.sweep_at(70_000), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_hits_never_exceed_budget() {
        let limiter = Arc::new(limiter(10, 60));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..5)
                        .filter(|_| limiter.check_at("shared", 1_000).is_allowed())
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn test_too_many_requests_shape() {
        let response = too_many_requests(Duration::from_secs(60));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }
}
