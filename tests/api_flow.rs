//! End-to-end API flows driven through the fully layered router.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use dev_gathering::store::{Event, EventRepository, NewEvent};

mod common;
use common::{
    app, app_with, login, test_config, Call, FailingMailer, RecordingMailer, StalledMailer, PASSWORD,
};

async fn published_event(repository: &dyn EventRepository, slug: &str) -> Event {
    repository
        .create_event(NewEvent {
            slug: slug.to_string(),
            name: "Dev Gathering Pune".to_string(),
            city: Some("Pune".to_string()),
            event_date: Some("2030-05-04".to_string()),
            is_published: true,
            ..NewEvent::default()
        })
        .await
        .unwrap()
}

async fn rsvp(router: &axum::Router, event: &Event, email: &str) -> String {
    let response = Call::post("/api/rsvp")
        .json(json!({
            "eventId": event.id.to_string(),
            "eventSlug": event.slug,
            "name": "Asha",
            "email": email,
        }))
        .send(router)
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body["rsvp"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_rate_limit_after_ten_api_requests() {
    let mut config = test_config(None);
    config.rate_limit.max_requests = 10;
    let app = app_with(config, Arc::new(RecordingMailer::default()));

    for _ in 0..10 {
        let response = Call::get("/api/health").from_ip("198.51.100.7").send(&app.router).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let limited = Call::get("/api/health").from_ip("198.51.100.7").send(&app.router).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.error(), "Too many requests. Please try again later.");
    assert_eq!(limited.headers[header::RETRY_AFTER], "60");
    assert_eq!(limited.headers["x-frame-options"], "DENY");
    assert_eq!(limited.headers["x-content-type-options"], "nosniff");
    assert!(limited.headers.contains_key("content-security-policy"));

    let other = Call::get("/api/health").from_ip("198.51.100.8").send(&app.router).await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn test_non_api_paths_are_not_limited() {
    let mut config = test_config(None);
    config.rate_limit.max_requests = 2;
    let app = app_with(config, Arc::new(RecordingMailer::default()));

    for _ in 0..5 {
        let response = Call::get("/robots.txt").send(&app.router).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_every_response_carries_request_id_and_headers() {
    let app = app(Arc::new(RecordingMailer::default()));
    let response = Call::get("/api/health").send(&app.router).await;

    assert_eq!(response.body["status"], "ok");
    assert!(response.headers.contains_key("x-request-id"));
    assert_eq!(
        response.headers["strict-transport-security"],
        "max-age=31536000; includeSubDomains"
    );
    assert_eq!(
        response.headers["referrer-policy"],
        "strict-origin-when-cross-origin"
    );
}

#[tokio::test]
async fn test_login_session_logout() {
    let app = app(Arc::new(RecordingMailer::default()));

    let wrong = Call::post("/api/admin/login")
        .json(json!({ "password": "nope" }))
        .send(&app.router)
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.error(), "Invalid credentials");
    assert!(wrong.session_cookie().is_none());

    let malformed = Call::post("/api/admin/login").json(json!({})).send(&app.router).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.error(), "Invalid credentials");

    let cookie = login(&app.router).await;
    assert!(cookie.starts_with("admin_session=admin:"));

    let session = Call::get("/api/admin/session").cookie(&cookie).send(&app.router).await;
    assert_eq!(session.status, StatusCode::OK);
    assert_eq!(session.body, json!({ "authenticated": true }));

    let anonymous = Call::get("/api/admin/session").send(&app.router).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body, json!({ "authenticated": false }));

    let logout = Call::post("/api/admin/logout").cookie(&cookie).send(&app.router).await;
    assert_eq!(logout.status, StatusCode::OK);
    let cleared = logout.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.starts_with("admin_session=;"));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_tampered_session_is_rejected() {
    let app = app(Arc::new(RecordingMailer::default()));
    let cookie = login(&app.router).await;
    let tampered = cookie.replacen("admin:", "admin:9", 1);

    let response = Call::get("/api/admin/events").cookie(&tampered).send(&app.router).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_event_mutations_require_reauth() {
    let app = app(Arc::new(RecordingMailer::default()));
    let body = json!({ "slug": "pune-meetup", "name": "Pune Meetup" });

    let anonymous = Call::post("/api/admin/events").json(body.clone()).send(&app.router).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app.router).await;
    let missing = Call::post("/api/admin/events")
        .cookie(&cookie)
        .json(body.clone())
        .send(&app.router)
        .await;
    assert_eq!(missing.status, StatusCode::FORBIDDEN);
    assert_eq!(missing.error(), "Re-authentication required");

    let mut wrong = body.clone();
    wrong["password"] = json!("guess");
    let failed = Call::post("/api/admin/events")
        .cookie(&cookie)
        .json(wrong)
        .send(&app.router)
        .await;
    assert_eq!(failed.status, StatusCode::FORBIDDEN);
    assert_eq!(failed.error(), "Re-authentication failed");

    let mut good = body;
    good["password"] = json!(PASSWORD);
    let created = Call::post("/api/admin/events")
        .cookie(&cookie)
        .json(good)
        .send(&app.router)
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
    assert_eq!(created.body["notifiedCount"], 0);

    let listed = Call::get("/api/admin/events").cookie(&cookie).send(&app.router).await;
    assert_eq!(listed.body["events"].as_array().unwrap().len(), 1);
    assert_eq!(listed.body["subscriberCount"], 0);

    // Drafts stay invisible to the public.
    let public = Call::get("/api/events/pune-meetup").send(&app.router).await;
    assert_eq!(public.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_validation_and_duplicate_slug() {
    let app = app(Arc::new(RecordingMailer::default()));
    let cookie = login(&app.router).await;

    let invalid = Call::post("/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "slug": "Bad Slug", "name": "X", "password": PASSWORD }))
        .send(&app.router)
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.error(), "Validation failed");
    assert!(invalid.body["errors"].as_array().unwrap().len() >= 2);

    let body = json!({ "slug": "goa-meetup", "name": "Goa Meetup", "password": PASSWORD });
    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let response = Call::post("/api/admin/events")
            .cookie(&cookie)
            .json(body.clone())
            .send(&app.router)
            .await;
        assert_eq!(response.status, expected);
    }
}

#[tokio::test]
async fn test_publish_notifies_subscribers() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = app(mailer.clone());

    for email in ["one@example.com", "two@example.com"] {
        let response = Call::post("/api/notify")
            .json(json!({ "email": email }))
            .send(&app.router)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["message"], "Email registered successfully");
    }
    assert_eq!(Call::get("/api/waitlist-count").send(&app.router).await.body["count"], 2);

    let cookie = login(&app.router).await;
    Call::post("/api/admin/events")
        .cookie(&cookie)
        .json(json!({
            "slug": "delhi-meetup",
            "name": "Delhi Meetup",
            "city": "Delhi",
            "password": PASSWORD
        }))
        .send(&app.router)
        .await;

    let invalid_action = Call::new(Method::PATCH, "/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "slug": "delhi-meetup", "action": "archive", "password": PASSWORD }))
        .send(&app.router)
        .await;
    assert_eq!(invalid_action.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid_action.error(), "Invalid action");

    let published = Call::new(Method::PATCH, "/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "slug": "delhi-meetup", "action": "publish", "password": PASSWORD }))
        .send(&app.router)
        .await;
    assert_eq!(published.status, StatusCode::OK, "{:?}", published.body);
    assert_eq!(published.body["notifiedCount"], 2);
    assert_eq!(
        mailer.recipients_of("New Event in Delhi"),
        vec!["one@example.com", "two@example.com"]
    );

    let events = Call::get("/api/events").send(&app.router).await;
    assert_eq!(events.body["events"][0]["slug"], "delhi-meetup");
}

#[tokio::test]
async fn test_update_and_delete_event() {
    let app = app(Arc::new(RecordingMailer::default()));
    let event = published_event(app.repository.as_ref(), "blr-meetup").await;
    let cookie = login(&app.router).await;

    let no_id = Call::new(Method::PUT, "/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "name": "Renamed" }))
        .send(&app.router)
        .await;
    assert_eq!(no_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_id.error(), "Event ID is required");

    let updated = Call::new(Method::PUT, "/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "id": event.id.to_string(), "name": "Bengaluru Meetup", "password": PASSWORD }))
        .send(&app.router)
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{:?}", updated.body);
    let fetched = Call::get("/api/events/blr-meetup").send(&app.router).await;
    assert_eq!(fetched.body["event"]["name"], "Bengaluru Meetup");

    let deleted = Call::new(Method::DELETE, "/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "id": event.id.to_string(), "password": PASSWORD }))
        .send(&app.router)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["message"], "Event deleted successfully");

    let again = Call::new(Method::DELETE, "/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "id": event.id.to_string(), "password": PASSWORD }))
        .send(&app.router)
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_forms_validate_input() {
    let app = app(Arc::new(RecordingMailer::default()));

    let invalid = Call::post("/api/notify")
        .json(json!({ "email": "not-an-email" }))
        .send(&app.router)
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.error(), "Validation failed");
    assert!(!invalid.body["errors"].as_array().unwrap().is_empty());

    let malformed = Call::post("/api/request").raw("{oops").send(&app.router).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.error(), "Invalid request body");

    let request = Call::post("/api/request")
        .json(json!({
            "name": "Ravi Kumar",
            "email": "ravi@example.com",
            "city": "Kochi",
            "role": "developer",
            "reason": "We have a growing Rust community here."
        }))
        .send(&app.router)
        .await;
    assert_eq!(request.status, StatusCode::OK, "{:?}", request.body);
    assert_eq!(request.body["message"], "Request submitted successfully");
    assert_eq!(app.repository.city_requests().await.len(), 1);
}

#[tokio::test]
async fn test_submissions_email_admin_and_visitor() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = app(mailer.clone());

    Call::post("/api/notify")
        .json(json!({ "email": "fan@example.com" }))
        .send(&app.router)
        .await;

    let mut subjects = mailer.subjects();
    subjects.sort();
    assert_eq!(
        subjects,
        vec!["New Email Subscription - Dev Gathering", "Welcome to Dev Gathering"]
    );
}

#[tokio::test]
async fn test_rsvp_rules() {
    let app = app(Arc::new(RecordingMailer::default()));
    let event = published_event(app.repository.as_ref(), "pune-rsvp").await;

    let missing = Call::post("/api/rsvp")
        .json(json!({ "eventId": event.id.to_string(), "name": "Asha" }))
        .send(&app.router)
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.error(), "Event ID, name, and email are required");

    let wrong_slug = Call::post("/api/rsvp")
        .json(json!({
            "eventId": event.id.to_string(),
            "eventSlug": "some-other-event",
            "name": "Asha",
            "email": "asha@example.com"
        }))
        .send(&app.router)
        .await;
    assert_eq!(wrong_slug.status, StatusCode::NOT_FOUND);

    rsvp(&app.router, &event, "asha@example.com").await;
    let duplicate = Call::post("/api/rsvp")
        .json(json!({
            "eventId": event.id.to_string(),
            "name": "Asha",
            "email": "ASHA@example.com"
        }))
        .send(&app.router)
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        duplicate.error(),
        "You have already submitted an RSVP for this event."
    );
}

#[tokio::test]
async fn test_approval_succeeds_when_mail_fails() {
    let app = app(Arc::new(FailingMailer));
    let event = published_event(app.repository.as_ref(), "mail-down").await;
    let rsvp_id = rsvp(&app.router, &event, "guest@example.com").await;
    let cookie = login(&app.router).await;

    let approved = Call::new(Method::PATCH, "/api/admin/rsvp")
        .cookie(&cookie)
        .json(json!({ "rsvpId": rsvp_id, "action": "approve" }))
        .send(&app.router)
        .await;
    assert_eq!(approved.status, StatusCode::OK, "{:?}", approved.body);
    assert_eq!(approved.body["success"], true);
    assert_eq!(approved.body["emailSent"], false);
    assert!(approved.body["message"]
        .as_str()
        .unwrap()
        .starts_with("RSVP approved (email failed:"));

    let listed = Call::get(format!("/api/admin/rsvp?eventId={}", event.id))
        .cookie(&cookie)
        .send(&app.router)
        .await;
    assert_eq!(listed.body["rsvps"][0]["status"], "approved");

    let bad_action = Call::new(Method::PATCH, "/api/admin/rsvp")
        .cookie(&cookie)
        .json(json!({ "rsvpId": rsvp_id, "action": "maybe" }))
        .send(&app.router)
        .await;
    assert_eq!(bad_action.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_approval_sends_invitation() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = app(mailer.clone());
    let event = published_event(app.repository.as_ref(), "mail-up").await;
    let rsvp_id = rsvp(&app.router, &event, "guest@example.com").await;
    let cookie = login(&app.router).await;

    let approved = Call::new(Method::PATCH, "/api/admin/rsvp")
        .cookie(&cookie)
        .json(json!({ "rsvpId": rsvp_id, "action": "approve" }))
        .send(&app.router)
        .await;
    assert_eq!(approved.body["emailSent"], true);
    assert_eq!(approved.body["message"], "RSVP approved and invitation sent");
    assert_eq!(
        mailer.recipients_of("You're confirmed for"),
        vec!["guest@example.com"]
    );

    let resent = Call::new(Method::PATCH, "/api/admin/rsvp")
        .cookie(&cookie)
        .json(json!({ "rsvpId": rsvp_id, "action": "resend_email" }))
        .send(&app.router)
        .await;
    assert_eq!(resent.body["message"], "Email resent successfully");
}

#[tokio::test]
async fn test_check_in_pass_redeems_once() {
    let app = app(Arc::new(RecordingMailer::default()));
    let event = published_event(app.repository.as_ref(), "check-in").await;
    let rsvp_id = rsvp(&app.router, &event, "door@example.com").await;
    let cookie = login(&app.router).await;

    let pending = Call::post("/api/admin/tokens")
        .cookie(&cookie)
        .json(json!({ "rsvpId": rsvp_id }))
        .send(&app.router)
        .await;
    assert_eq!(pending.status, StatusCode::BAD_REQUEST);

    Call::new(Method::PATCH, "/api/admin/rsvp")
        .cookie(&cookie)
        .json(json!({ "rsvpId": rsvp_id, "action": "approve" }))
        .send(&app.router)
        .await;

    let issued = Call::post("/api/admin/tokens")
        .cookie(&cookie)
        .json(json!({ "rsvpId": rsvp_id }))
        .send(&app.router)
        .await;
    assert_eq!(issued.status, StatusCode::CREATED, "{:?}", issued.body);
    let token = issued.body["token"].as_str().unwrap().to_string();

    let first = Call::post("/api/admin/checkin")
        .cookie(&cookie)
        .json(json!({ "token": token, "rsvpId": rsvp_id }))
        .send(&app.router)
        .await;
    assert_eq!(first.status, StatusCode::OK, "{:?}", first.body);
    assert_eq!(first.body["attendee"]["event"], "check-in");

    let second = Call::post("/api/admin/checkin")
        .cookie(&cookie)
        .json(json!({ "token": token, "rsvpId": rsvp_id }))
        .send(&app.router)
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.error(), "Invalid or expired token");
}

#[tokio::test]
async fn test_stalled_announcement_still_reports_publish() {
    let audit_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(Some(audit_dir.path()));
    config.timeouts.request_secs = 2;
    config.timeouts.downstream_secs = 1;
    let app = app_with(
        config,
        Arc::new(StalledMailer {
            delay: Duration::from_secs(3),
        }),
    );

    for i in 0..20 {
        app.repository
            .upsert_subscriber(&format!("sub{i}@example.com"))
            .await
            .unwrap();
    }
    app.repository
        .create_event(NewEvent {
            slug: "slow-mail".to_string(),
            name: "Slow Mail Meetup".to_string(),
            city: Some("Goa".to_string()),
            ..NewEvent::default()
        })
        .await
        .unwrap();

    let cookie = login(&app.router).await;
    let started = Instant::now();
    let published = Call::new(Method::PATCH, "/api/admin/events")
        .cookie(&cookie)
        .json(json!({ "slug": "slow-mail", "action": "publish", "password": PASSWORD }))
        .send(&app.router)
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(published.status, StatusCode::OK, "{:?}", published.body);
    assert_eq!(published.body["success"], true);
    assert_eq!(published.body["notifiedCount"], 0);

    let event = Call::get("/api/events/slow-mail").send(&app.router).await;
    assert_eq!(event.status, StatusCode::OK);

    let mut contents = String::new();
    for entry in std::fs::read_dir(audit_dir.path()).unwrap() {
        contents.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
    }
    assert!(contents.contains("\"event\":\"event_published\""));
}

#[tokio::test]
async fn test_audit_trail_never_holds_raw_email() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(
        test_config(Some(dir.path())),
        Arc::new(RecordingMailer::default()),
    );

    Call::post("/api/notify")
        .json(json!({ "email": "private.person@example.com" }))
        .send(&app.router)
        .await;

    let mut contents = String::new();
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        contents.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
    }
    assert!(contents.contains("\"event\":\"notify_submit\""));
    assert!(contents.contains("\"ipHash\""));
    assert!(!contents.contains("private.person@example.com"));
    assert!(!contents.contains("203.0.113.10"));
}
