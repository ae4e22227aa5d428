//! Admin login, session checks and re-authentication.

use axum::{
    body::Bytes,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::audit::AuditEvent;
use crate::auth::read_session_cookie;
use crate::http::request::{parse_json, ClientIp};
use crate::http::{ApiError, AppState};
use crate::observability::metrics;
use crate::validation::{validate_form, AdminLogin, FormResult};

pub const REAUTH_REQUIRED: &str = "Re-authentication required";
pub const REAUTH_FAILED: &str = "Re-authentication failed";

/// Proof that the request carries a valid admin session cookie.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if has_valid_session(&parts.headers, state) {
            Ok(AdminSession)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

fn has_valid_session(headers: &HeaderMap, state: &AppState) -> bool {
    read_session_cookie(headers).is_some_and(|token| state.session().validate_session(&token))
}

/// Re-verify the admin password before a sensitive mutation.
///
/// `context` names the operation in the audit trail.
pub async fn require_reauth(
    state: &AppState,
    password: Option<&str>,
    ip: &str,
    context: &str,
) -> Result<(), ApiError> {
    let Some(password) = password.filter(|p| !p.is_empty()) else {
        return Err(ApiError::Forbidden(REAUTH_REQUIRED));
    };

    if state.session().re_authenticate(password).await {
        return Ok(());
    }

    metrics::record_auth_failure("reauth");
    state.audit.log_event(
        AuditEvent::AdminLoginFailed,
        json!({ "context": format!("re-auth for {context}") }),
        Some(ip),
    );
    Err(ApiError::Forbidden(REAUTH_FAILED))
}

/// `POST /api/admin/login`
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = parse_json(&body)?;
    let FormResult::Valid(AdminLogin { password }) = validate_form::<AdminLogin>(&body) else {
        return Err(ApiError::bad_request("Invalid credentials"));
    };

    let auth = state.session();
    if !auth.verify_password(&password).await {
        metrics::record_auth_failure("login");
        state
            .audit
            .log_event(AuditEvent::AdminLoginFailed, json!({}), Some(&ip));
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth
        .create_session_token()
        .map_err(|e| ApiError::internal("An unexpected error occurred", e))?;
    let cookie = state
        .cookie
        .issue(&token)
        .map_err(|e| ApiError::internal("An unexpected error occurred", e))?;

    state.audit.log_event(AuditEvent::AdminLogin, json!({}), Some(&ip));
    tracing::info!("Admin session issued");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "message": "Login successful" })),
    )
        .into_response())
}

/// `GET /api/admin/session`
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if has_valid_session(&headers, &state) {
        (StatusCode::OK, Json(json!({ "authenticated": true })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "authenticated": false })))
    }
}

/// `POST /api/admin/logout`: always clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Response {
    if has_valid_session(&headers, &state) {
        state.audit.log_event(AuditEvent::AdminLogout, json!({}), Some(&ip));
    }
    (
        [(header::SET_COOKIE, state.cookie.destroy_session())],
        Json(json!({ "success": true, "message": "Logged out" })),
    )
        .into_response()
}
