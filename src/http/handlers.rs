//! Public API handlers.
//!
//! # Responsibilities
//! - Subscriptions, city requests and RSVPs from the public site
//! - Read-only views of published events and the waitlist size
//!
//! # Design Decisions
//! - Persistence failures on subscriptions are logged, not surfaced; the
//!   visitor still gets a confirmation
//! - Mail is sent after the primary write and never changes the response;
//!   it is cut off at the side-effect deadline

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::audit::AuditEvent;
use crate::http::error::ApiError;
use crate::http::request::{parse_json, ClientIp};
use crate::http::state::AppState;
use crate::mail::Submission;
use crate::store::{CityRequest, NewRsvp, RepositoryError};
use crate::resilience::DownstreamError;
use crate::validation::{validate_form, FormResult, NotifyForm, RequestForm, RsvpForm};

pub const EVENT_CLOSED: &str = "Event not found or not accepting RSVPs";

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Validate a form, auditing rejections under `kind`.
fn validated<F: crate::validation::FormSchema>(
    state: &AppState,
    kind: &str,
    body: &Value,
    ip: &str,
) -> Result<F, ApiError> {
    match validate_form::<F>(body) {
        FormResult::Valid(form) => Ok(form),
        FormResult::Invalid(errors) => {
            state.audit.log_event(
                AuditEvent::ValidationFailed,
                json!({ "type": kind, "errors": errors }),
                Some(ip),
            );
            Err(ApiError::Validation(errors))
        }
    }
}

/// `POST /api/notify`
pub async fn notify(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let deadline = state.side_effect_deadline(Instant::now());
    let body = parse_json(&body)?;
    let form: NotifyForm = validated(&state, "notify", &body, &ip)?;

    if let Err(e) = state.repo(state.repository.upsert_subscriber(&form.email)).await {
        state.audit.log_error(
            "Failed to save subscriber",
            Some(&e.to_string()),
            json!({ "context": "save_subscriber", "email": form.email }),
        );
    }

    state
        .audit
        .log_event(AuditEvent::NotifySubmit, json!({ "email": form.email }), Some(&ip));

    let fields = [("Email", form.email.as_str())];
    let (admin, user) = tokio::join!(
        state.side_effect(deadline, state.notifier.notify_admin(Submission::Notify, &fields)),
        state.side_effect(deadline, state.notifier.acknowledge(Submission::Notify, &form.email)),
    );
    tracing::debug!(admin = ?admin, user = ?user, "Notify mail outcome");

    Ok(Json(json!({
        "success": true,
        "message": "Email registered successfully",
    })))
}

/// `POST /api/request`
pub async fn request_city(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let deadline = state.side_effect_deadline(Instant::now());
    let body = parse_json(&body)?;
    let form: RequestForm = validated(&state, "request", &body, &ip)?;

    let request = CityRequest::from_form(form.clone(), Utc::now());
    if let Err(e) = state.repo(state.repository.save_city_request(request)).await {
        state.audit.log_error(
            "Failed to save city request",
            Some(&e.to_string()),
            json!({ "context": "save_city_request", "email": form.email, "city": form.city }),
        );
    }
    if let Err(e) = state.repo(state.repository.upsert_subscriber(&form.email)).await {
        tracing::warn!(error = %e, "Failed to subscribe city requester");
    }

    state.audit.log_event(
        AuditEvent::RequestSubmit,
        json!({
            "name": form.name,
            "email": form.email,
            "city": form.city,
            "role": form.role,
        }),
        Some(&ip),
    );

    let fields = [
        ("Name", form.name.as_str()),
        ("Email", form.email.as_str()),
        ("City", form.city.as_str()),
        ("Role", form.role.as_str()),
        ("Reason", form.reason.as_str()),
    ];
    let (admin, user) = tokio::join!(
        state.side_effect(deadline, state.notifier.notify_admin(Submission::Request, &fields)),
        state.side_effect(deadline, state.notifier.acknowledge(Submission::Request, &form.email)),
    );
    tracing::debug!(admin = ?admin, user = ?user, "Request mail outcome");

    Ok(Json(json!({
        "success": true,
        "message": "Request submitted successfully",
    })))
}

/// `POST /api/rsvp`
///
/// The event must exist and be published. When `eventSlug` is sent it must
/// name the same event.
pub async fn rsvp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body = parse_json(&body)?;
    let form = match validate_form::<RsvpForm>(&body) {
        FormResult::Valid(form) => form,
        FormResult::Invalid(errors) => {
            let message = errors
                .into_iter()
                .next()
                .unwrap_or_else(|| "Invalid input".to_string());
            return Err(ApiError::BadRequest(message));
        }
    };

    let event = state
        .repo(state.repository.event_by_id(form.event_id))
        .await
        .map_err(ApiError::from_repository("Failed to submit RSVP"))?;
    let open = event.is_some_and(|event| {
        event.is_published
            && form
                .event_slug
                .as_deref()
                .map_or(true, |slug| slug == event.slug)
    });
    if !open {
        return Err(ApiError::not_found(EVENT_CLOSED));
    }

    let email = form.email.clone();
    let created = state
        .repo(state.repository.create_rsvp(NewRsvp::from(form)))
        .await
        .map_err(|e| match e {
            DownstreamError::Failed(RepositoryError::Conflict(message)) => {
                ApiError::bad_request(message)
            }
            DownstreamError::Failed(RepositoryError::NotFound(_)) => {
                ApiError::not_found(EVENT_CLOSED)
            }
            other => ApiError::internal("Failed to submit RSVP", other),
        })?;

    state.audit.log_event(
        AuditEvent::RsvpSubmitted,
        json!({ "eventId": created.event_id, "email": email }),
        Some(&ip),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "RSVP submitted successfully. You will receive a confirmation email once approved.",
            "rsvp": { "id": created.id, "status": created.status },
        })),
    ))
}

/// `GET /api/events`
pub async fn list_events(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let events = state
        .repo(state.repository.list_published_events())
        .await
        .map_err(ApiError::from_repository("Failed to fetch events"))?;
    Ok(Json(json!({ "events": events })))
}

/// `GET /api/events/{slug}`: published events only.
pub async fn event_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let event = state
        .repo(state.repository.event_by_slug(&slug))
        .await
        .map_err(ApiError::from_repository("Failed to fetch event"))?
        .filter(|event| event.is_published)
        .ok_or_else(|| ApiError::not_found("Event not found"))?;
    Ok(Json(json!({ "event": event })))
}

/// `GET /api/waitlist-count`: zero when the count is unavailable.
pub async fn waitlist_count(State(state): State<AppState>) -> Json<Value> {
    let count = match state.repo(state.repository.waitlist_count()).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, "Waitlist count unavailable");
            0
        }
    };
    Json(json!({ "count": count }))
}
