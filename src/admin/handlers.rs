//! Event management and RSVP moderation.
//!
//! Every handler requires an [`AdminSession`]. Creating, publishing, editing
//! and deleting events also re-verify the admin password carried in the body.
//! Emails to subscribers and attendees are side effects: their failure is
//! reported in the response, never turned into an error. They stop at the
//! handler's side-effect deadline so the response always goes out.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use uuid::Uuid;

use crate::admin::auth::{require_reauth, AdminSession};
use crate::audit::AuditEvent;
use crate::http::request::{parse_json, parse_id, str_field, ClientIp};
use crate::http::{ApiError, AppState};
use crate::mail::{SideEffect, WithSideEffect};
use crate::store::{Event, NewEvent, Rsvp, RsvpStatus};
use crate::validation::{validate_form, CreateEvent, FormResult, UpdateEvent};

fn form_or_400<F>(result: FormResult<F>) -> Result<F, ApiError> {
    result.into_result().map_err(ApiError::Validation)
}

/// Announce `event` to every active subscriber, stopping at `deadline`.
async fn notify_subscribers(state: &AppState, event: &Event, deadline: Instant) -> SideEffect {
    match state.repo(state.repository.active_subscriber_emails()).await {
        Ok(emails) => state.notifier.announce_event(event, &emails, deadline).await,
        Err(e) => {
            tracing::warn!(slug = %event.slug, error = %e, "Could not load subscribers");
            SideEffect::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// `GET /api/admin/events`
pub async fn list_events(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let (events, subscriber_count) = tokio::try_join!(
        state.repo(state.repository.list_events()),
        state.repo(state.repository.active_subscriber_count()),
    )
    .map_err(ApiError::from_repository("Failed to fetch events"))?;

    Ok(Json(json!({
        "events": events,
        "subscriberCount": subscriber_count,
    })))
}

/// `POST /api/admin/events`
pub async fn create_event(
    _session: AdminSession,
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let deadline = state.side_effect_deadline(Instant::now());
    let body = parse_json(&body)?;
    require_reauth(&state, str_field(&body, "password"), &ip, "event creation").await?;
    let form = form_or_400(validate_form::<CreateEvent>(&body))?;

    let announce = form.notify_subscribers && form.city.is_some() && form.date.is_some();
    let slug = form.slug.clone();
    let event = match state.repo(state.repository.create_event(NewEvent::from(form))).await {
        Ok(event) => event,
        Err(e) => {
            state.audit.log_event(
                AuditEvent::EventCreationFailed,
                json!({ "slug": slug, "error": e.to_string() }),
                Some(&ip),
            );
            return Err(ApiError::from_repository("Failed to create event")(e));
        }
    };

    state.audit.log_event(
        AuditEvent::EventCreated,
        json!({ "slug": event.slug, "name": event.name }),
        Some(&ip),
    );

    let notified = if announce {
        let outcome = notify_subscribers(&state, &event, deadline).await;
        match outcome.failure() {
            Some(reason) => state.audit.log_error(
                "Subscriber notification failed",
                Some(reason),
                json!({ "context": "notify_subscribers", "slug": event.slug }),
            ),
            None => state.audit.log_event(
                AuditEvent::SubscribersNotified,
                json!({ "slug": event.slug, "count": outcome.count() }),
                Some(&ip),
            ),
        }
        outcome
    } else {
        SideEffect::Skipped
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Event created successfully",
            "notifiedCount": notified.count(),
        })),
    ))
}

/// `PATCH /api/admin/events` with `{"action": "publish", "slug", "password"}`
pub async fn publish_event(
    _session: AdminSession,
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let deadline = state.side_effect_deadline(Instant::now());
    let body = parse_json(&body)?;
    if str_field(&body, "action") != Some("publish") {
        return Err(ApiError::bad_request("Invalid action"));
    }
    require_reauth(&state, str_field(&body, "password"), &ip, "event publishing").await?;
    let slug = str_field(&body, "slug").ok_or_else(|| ApiError::bad_request("Event slug is required"))?;

    let event = state
        .repo(state.repository.publish_event(slug))
        .await
        .map_err(ApiError::from_repository("Failed to update event"))?;

    let outcome = notify_subscribers(&state, &event, deadline).await;
    if let Some(reason) = outcome.failure() {
        tracing::warn!(slug = %event.slug, reason, "Publish announcement failed");
    }
    state.audit.log_event(
        AuditEvent::EventPublished,
        json!({ "slug": event.slug, "notifiedCount": outcome.count() }),
        Some(&ip),
    );

    Ok(Json(json!({
        "success": true,
        "message": "Event published and subscribers notified",
        "notifiedCount": outcome.count(),
    })))
}

/// `PUT /api/admin/events`
pub async fn update_event(
    _session: AdminSession,
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_json(&body)?;
    if str_field(&body, "id").is_none() {
        return Err(ApiError::bad_request("Event ID is required"));
    }
    require_reauth(&state, str_field(&body, "password"), &ip, "event update").await?;
    let form = form_or_400(validate_form::<UpdateEvent>(&body))?;

    let event = state
        .repo(state.repository.update_event(form.into()))
        .await
        .map_err(ApiError::from_repository("Failed to update event"))?;

    state.audit.log_event(
        AuditEvent::EventUpdated,
        json!({ "id": event.id, "name": event.name }),
        Some(&ip),
    );

    Ok(Json(json!({
        "success": true,
        "message": "Event updated successfully",
    })))
}

/// `DELETE /api/admin/events`
pub async fn delete_event(
    _session: AdminSession,
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_json(&body)?;
    let raw_id = str_field(&body, "id").ok_or_else(|| ApiError::bad_request("Event ID is required"))?;
    require_reauth(&state, str_field(&body, "password"), &ip, "event deletion").await?;
    let id = parse_id(raw_id, "Invalid event ID")?;

    state
        .repo(state.repository.delete_event(id))
        .await
        .map_err(ApiError::from_repository("Failed to delete event"))?;

    state
        .audit
        .log_event(AuditEvent::EventDeleted, json!({ "id": id }), Some(&ip));

    Ok(Json(json!({
        "success": true,
        "message": "Event deleted successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct RsvpQuery {
    #[serde(rename = "eventId")]
    pub event_id: Option<String>,
}

/// `GET /api/admin/rsvp?eventId=`
pub async fn list_rsvps(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<RsvpQuery>,
) -> Result<Json<Value>, ApiError> {
    let raw_id = query
        .event_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Event ID is required"))?;
    let event_id = parse_id(raw_id, "Invalid event ID")?;

    let rsvps = state
        .repo(state.repository.rsvps_for_event(event_id))
        .await
        .map_err(ApiError::from_repository("Failed to fetch RSVPs"))?;
    Ok(Json(json!({ "rsvps": rsvps })))
}

/// Send the invitation for an RSVP, whatever its current status.
async fn invite(
    state: &AppState,
    id: Uuid,
    deadline: Instant,
) -> Result<WithSideEffect<Rsvp>, ApiError> {
    let (rsvp, event) = state
        .repo(state.repository.rsvp_with_event(id))
        .await
        .map_err(ApiError::from_repository("Failed to update RSVP"))?;
    let side_effect = state
        .side_effect(deadline, state.notifier.send_invitation(&rsvp, &event))
        .await;
    Ok(WithSideEffect::new(rsvp, side_effect))
}

fn email_error(outcome: &SideEffect) -> &str {
    outcome.failure().unwrap_or("Email failed")
}

/// `PATCH /api/admin/rsvp` with `{"rsvpId", "action"}`
pub async fn moderate_rsvp(
    _session: AdminSession,
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let deadline = state.side_effect_deadline(Instant::now());
    let body = parse_json(&body)?;
    let (Some(raw_id), Some(action)) = (str_field(&body, "rsvpId"), str_field(&body, "action")) else {
        return Err(ApiError::bad_request("RSVP ID and action are required"));
    };
    let id = parse_id(raw_id, "Invalid RSVP ID")?;

    match action {
        "approve" => {
            state
                .repo(state.repository.set_rsvp_status(id, RsvpStatus::Approved))
                .await
                .map_err(ApiError::from_repository("Failed to update RSVP"))?;

            let sent = invite(&state, id, deadline).await?;
            let email_sent = sent.side_effect.delivered();
            if email_sent {
                state.audit.log_event(
                    AuditEvent::RsvpInvitationSent,
                    json!({ "rsvpId": id, "email": sent.primary.email }),
                    Some(&ip),
                );
            }
            state.audit.log_event(
                AuditEvent::RsvpApproved,
                json!({ "rsvpId": id, "emailSent": email_sent }),
                Some(&ip),
            );

            let message = if email_sent {
                "RSVP approved and invitation sent".to_string()
            } else {
                format!("RSVP approved (email failed: {})", email_error(&sent.side_effect))
            };
            Ok(Json(json!({
                "success": true,
                "message": message,
                "emailSent": email_sent,
            })))
        }
        "reject" => {
            state
                .repo(state.repository.set_rsvp_status(id, RsvpStatus::Rejected))
                .await
                .map_err(ApiError::from_repository("Failed to update RSVP"))?;
            state
                .audit
                .log_event(AuditEvent::RsvpRejected, json!({ "rsvpId": id }), Some(&ip));

            Ok(Json(json!({
                "success": true,
                "message": "RSVP rejected",
            })))
        }
        "resend_email" => {
            let sent = invite(&state, id, deadline).await?;
            let email_sent = sent.side_effect.delivered();
            if email_sent {
                state.audit.log_event(
                    AuditEvent::RsvpInvitationResent,
                    json!({ "rsvpId": id, "email": sent.primary.email }),
                    Some(&ip),
                );
            }

            let message = if email_sent {
                "Email resent successfully".to_string()
            } else {
                format!("Email failed: {}", email_error(&sent.side_effect))
            };
            Ok(Json(json!({
                "success": true,
                "message": message,
                "emailSent": email_sent,
            })))
        }
        _ => Err(ApiError::bad_request(
            r#"Invalid action. Use "approve", "reject", or "resend_email""#,
        )),
    }
}
