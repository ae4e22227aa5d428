//! Check-in passes for approved attendees.
//!
//! A pass is a one-time token bound to `(event id, RSVP id)`. Scanning it at
//! the door redeems it; a second scan is rejected.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::admin::auth::AdminSession;
use crate::audit::AuditEvent;
use crate::http::request::{parse_id, parse_json, str_field, ClientIp};
use crate::http::{ApiError, AppState};
use crate::store::RsvpStatus;
use crate::tokens::TokenError;

/// `POST /api/admin/tokens` with `{"rsvpId"}`
pub async fn issue_token(
    _session: AdminSession,
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body = parse_json(&body)?;
    let raw_id = str_field(&body, "rsvpId").ok_or_else(|| ApiError::bad_request("RSVP ID is required"))?;
    let id = parse_id(raw_id, "Invalid RSVP ID")?;

    let (rsvp, event) = state
        .repo(state.repository.rsvp_with_event(id))
        .await
        .map_err(ApiError::from_repository("Failed to issue token"))?;
    if rsvp.status != RsvpStatus::Approved {
        return Err(ApiError::bad_request("RSVP is not approved"));
    }

    let token = state
        .tokens
        .generate_token(&event.id.to_string(), &rsvp.id.to_string())
        .map_err(|e| match e {
            TokenError::NotConfigured => ApiError::internal("Check-in passes are not configured", e),
            other => ApiError::internal("Failed to issue token", other),
        })?;

    state.audit.log_event(
        AuditEvent::TokenIssued,
        json!({ "rsvpId": rsvp.id, "eventId": event.id }),
        Some(&ip),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "expiresIn": state.tokens.ttl().as_secs(),
        })),
    ))
}

/// `POST /api/admin/checkin` with `{"token", "rsvpId"}`
pub async fn check_in(
    _session: AdminSession,
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_json(&body)?;
    let (Some(token), Some(raw_id)) = (str_field(&body, "token"), str_field(&body, "rsvpId")) else {
        return Err(ApiError::bad_request("Token and RSVP ID are required"));
    };
    let id = parse_id(raw_id, "Invalid RSVP ID")?;

    let (rsvp, event) = state
        .repo(state.repository.rsvp_with_event(id))
        .await
        .map_err(ApiError::from_repository("Failed to check in"))?;

    if let Err(e) = state
        .tokens
        .verify_token(token, &event.id.to_string(), &rsvp.id.to_string())
    {
        tracing::info!(rsvp_id = %rsvp.id, reason = e.label(), "Check-in rejected");
        state.audit.log_event(
            AuditEvent::TokenRejected,
            json!({ "rsvpId": rsvp.id, "reason": e.label() }),
            Some(&ip),
        );
        return Err(ApiError::bad_request(e.public_message()));
    }

    state.audit.log_event(
        AuditEvent::TokenRedeemed,
        json!({ "rsvpId": rsvp.id, "eventId": event.id }),
        Some(&ip),
    );

    Ok(Json(json!({
        "success": true,
        "message": "Check-in confirmed",
        "attendee": {
            "id": rsvp.id,
            "name": rsvp.name,
            "event": event.slug,
        },
    })))
}
