//! API error responses.
//!
//! Every handler failure becomes one of these. Internal failures log their
//! detail and answer with a fixed public message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::resilience::DownstreamError;
use crate::store::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{public}: {detail}")]
    Internal { public: &'static str, detail: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal(public: &'static str, detail: impl ToString) -> Self {
        ApiError::Internal {
            public,
            detail: detail.to_string(),
        }
    }

    /// Map a repository failure; `public` is shown for unavailability and timeouts.
    pub fn from_repository(public: &'static str) -> impl FnOnce(DownstreamError<RepositoryError>) -> Self {
        move |error| match error {
            DownstreamError::Failed(RepositoryError::NotFound(what)) => {
                ApiError::NotFound(format!("{} not found", capitalize(what)))
            }
            DownstreamError::Failed(RepositoryError::Conflict(message)) => {
                ApiError::Conflict(message.to_string())
            }
            other => ApiError::internal(public, other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!({
                "error": "Validation failed",
                "errors": errors,
            }),
            ApiError::Unauthorized => json!({ "error": "Unauthorized" }),
            ApiError::InvalidCredentials => json!({ "error": "Invalid credentials" }),
            ApiError::Internal { public, detail } => {
                tracing::error!(error = %detail, "{public}");
                json!({ "error": public })
            }
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message) => json!({ "error": message }),
            ApiError::Forbidden(message) => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}
