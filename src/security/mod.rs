//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve client address under the forwarded-for policy)
//!     → rate_limit.rs (rolling window per address fingerprint, 429 when spent)
//!     → handler
//! Outgoing response (all of them, 429 included):
//!     → headers.rs (HSTS, CSP, framing, sniffing, referrer, permissions)
//! ```
//!
//! # Design Decisions
//! - Rate limiting is abuse mitigation, not an authentication boundary
//! - Limiter state is injected, never global
//! - Headers are applied outermost so nothing escapes without them

pub mod client_ip;
pub mod headers;
pub mod rate_limit;

pub use client_ip::ClientIpResolver;
pub use rate_limit::{
    fingerprint, MemoryRateLimitStore, RateDecision, RateLimitState, RateLimitStore, RateLimiter,
};
