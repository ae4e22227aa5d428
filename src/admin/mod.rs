//! Admin API, mounted under `/api/admin`.
//!
//! # Data Flow
//! ```text
//! login / session / logout → auth.rs (password check, session cookie)
//! events / rsvp            → handlers.rs (AdminSession, re-auth for event mutations)
//! tokens / checkin         → checkin.rs (one-time check-in passes)
//! ```

pub mod auth;
pub mod checkin;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::AppState;

pub use auth::{require_reauth, AdminSession};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/session", get(auth::session))
        .route("/logout", post(auth::logout))
        .route(
            "/events",
            get(handlers::list_events)
                .post(handlers::create_event)
                .patch(handlers::publish_event)
                .put(handlers::update_event)
                .delete(handlers::delete_event),
        )
        .route(
            "/rsvp",
            get(handlers::list_rsvps).patch(handlers::moderate_rsvp),
        )
        .route("/tokens", post(checkin::issue_token))
        .route("/checkin", post(checkin::check_in))
}
