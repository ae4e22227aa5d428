//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (router, layers, graceful shutdown, reload)
//!     → security headers, request id, trace, timeout, body limit
//!     → rate limiter (paths under /api/)
//!     → response.rs (per-route metrics)
//!     → handlers.rs (public API) | admin (session-gated API)
//!         → request.rs (client address, JSON body)
//!         → validation forms → store / mail / tokens / audit
//!     → error.rs (failures as JSON)
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use request::{ClientIp, X_REQUEST_ID};
pub use server::HttpServer;
pub use state::AppState;
