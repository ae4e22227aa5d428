//! Outbound email.
//!
//! # Data Flow
//! ```text
//! handler outcome (subscriber saved, RSVP approved, event published)
//!     → notifier.rs (pick recipients, build message, apply deadline)
//!     → messages.rs (subject + escaped HTML body)
//!     → Mailer: http.rs (transactional email API, retries)
//!            or log.rs (no API key: log and drop)
//!     → outcome.rs (SideEffect reported next to the primary result)
//! ```
//!
//! # Design Decisions
//! - Mail is never on the success path of the primary operation
//! - Every interpolated value is HTML-escaped
//! - Recipients are never logged in full

pub mod http;
pub mod log;
pub mod messages;
pub mod notifier;
pub mod outcome;

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::MailConfig;

pub use http::HttpMailer;
pub use log::LogMailer;
pub use messages::Submission;
pub use notifier::Notifier;
pub use outcome::{SideEffect, WithSideEffect};

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("{0}")]
    Other(String),
}

impl MailError {
    /// Worth retrying: connection problems, throttling, server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            MailError::Transport(e) => e.is_connect() || e.is_timeout(),
            MailError::Rejected { status, .. } => *status == 429 || *status >= 500,
            MailError::Other(_) => false,
        }
    }
}

pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, message: &'a MailMessage) -> BoxFuture<'a, Result<(), MailError>>;
}

/// The HTTP client when an API key is configured, otherwise the log mailer.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.api_key {
        Some(key) if !key.is_empty() => Ok(Arc::new(HttpMailer::from_config(config, key)?)),
        _ => {
            tracing::warn!("RESEND_API_KEY is not configured; outbound mail is only logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
