//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the repository or the mail API:
//!     → timeouts.rs (deadline; a timeout is a recoverable failure)
//! Outbound mail delivery only:
//!     → retries.rs (retry transient failures)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Every downstream call has a deadline
//! - Timeout errors are distinct from the callee's own errors
//! - Only failures the callee marks as transient are retried

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{retry, RetryPolicy};
pub use timeouts::{with_deadline, DownstreamError};
