//! Network layer subsystem.
//!
//! The API listens on plain TCP by default. With `[listener.tls]` configured,
//! the same listener is served through rustls instead.

pub mod tls;

pub use tls::load_tls_config;
