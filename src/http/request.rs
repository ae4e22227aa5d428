//! Request-side helpers.
//!
//! # Responsibilities
//! - Name the request-id header set by the server layers
//! - Resolve the client address for audit hashing
//! - Parse JSON bodies into untyped values for the form schemas
//! - Pull loose string and id members out of admin bodies
//!
//! # Design Decisions
//! - Bodies are parsed by hand so a malformed body gets the same JSON error
//!   shape as every other failure

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use serde_json::Value;
use uuid::Uuid;

use crate::http::error::ApiError;
use crate::http::state::AppState;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Client address as resolved under the forwarded-for policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(state.client_ip.resolve(&parts.headers, peer)))
    }
}

/// Parse a request body as JSON.
pub fn parse_json(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid request body"))
}

/// A non-blank string member of a JSON object, trimmed.
pub fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Parse an identifier, answering 400 with `message` when it is not a UUID.
pub fn parse_id(raw: &str, message: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(message))
}
