//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (tracing subscriber: pretty or JSON)
//!     → metrics.rs (counters, histograms)
//!
//! Request spans come from tower-http's TraceLayer and carry the
//! x-request-id assigned by the server.
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated PII
//! - The audit trail is separate (see `audit`); logs are operational
//! - Metrics are cheap (atomic increments); a missing recorder is a no-op

pub mod logging;
pub mod metrics;
