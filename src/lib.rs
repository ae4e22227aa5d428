//! Dev Gathering API library.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Security core
pub mod audit;
pub mod auth;
pub mod security;
pub mod tokens;
pub mod validation;

// Domain
pub mod admin;
pub mod mail;
pub mod store;

// Cross-cutting concerns
pub mod clock;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatheringConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
