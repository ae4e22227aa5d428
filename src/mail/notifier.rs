//! Best-effort notifications around the primary operations.
//!
//! # Responsibilities
//! - Choose recipients (organizer, submitter, subscribers, attendee)
//! - Bound each delivery with the downstream deadline and a broadcast with
//!   the caller's deadline
//! - Report a `SideEffect`, never an error

use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use tokio::time::Instant;

use super::messages::{self, Submission};
use super::outcome::SideEffect;
use super::{MailMessage, Mailer};
use crate::audit::redact::mask_email;
use crate::config::MailConfig;
use crate::resilience::with_deadline;
use crate::store::{Event, Rsvp};

/// Concurrent sends during a subscriber broadcast.
const BROADCAST_CONCURRENCY: usize = 8;

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    admin_address: Option<String>,
    site_url: String,
    deadline: Duration,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        admin_address: Option<String>,
        site_url: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            mailer,
            admin_address,
            site_url: site_url.into(),
            deadline,
        }
    }

    pub fn from_config(mailer: Arc<dyn Mailer>, config: &MailConfig, deadline: Duration) -> Self {
        Self::new(
            mailer,
            config.admin_address.clone().filter(|a| !a.is_empty()),
            config.site_url.clone(),
            deadline,
        )
    }

    async fn deliver(&self, message: &MailMessage) -> Result<(), String> {
        with_deadline(self.deadline, self.mailer.send(message))
            .await
            .map_err(|e| e.to_string())
    }

    async fn deliver_one(&self, message: MailMessage, context: &'static str) -> SideEffect {
        match self.deliver(&message).await {
            Ok(()) => SideEffect::Delivered { count: 1 },
            Err(reason) => {
                tracing::warn!(
                    context,
                    to = %mask_email(&message.to),
                    error = %reason,
                    "Mail delivery failed"
                );
                SideEffect::Failed { reason }
            }
        }
    }

    /// Tell the organizer about a submission. Skipped without an admin address.
    pub async fn notify_admin(&self, kind: Submission, fields: &[(&str, &str)]) -> SideEffect {
        let Some(admin) = &self.admin_address else {
            tracing::debug!("ADMIN_EMAIL is not configured; admin notification skipped");
            return SideEffect::Skipped;
        };
        let message = messages::admin_notification(kind, admin, fields, &self.site_url);
        self.deliver_one(message, "admin_notification").await
    }

    pub async fn acknowledge(&self, kind: Submission, email: &str) -> SideEffect {
        let message = messages::acknowledgment(kind, email, &self.site_url);
        self.deliver_one(message, "user_acknowledgment").await
    }

    /// Announce an event to every subscriber, stopping at `deadline`.
    ///
    /// Individual failures are logged and skipped; the result only fails when
    /// nobody could be reached. Sends still in flight at the deadline are
    /// abandoned and the ones already delivered are counted.
    pub async fn announce_event(
        &self,
        event: &Event,
        subscribers: &[String],
        deadline: Instant,
    ) -> SideEffect {
        if subscribers.is_empty() {
            return SideEffect::Delivered { count: 0 };
        }

        let results: Vec<Result<(), String>> = stream::iter(subscribers.iter().cloned())
            .map(|email| {
                let message = messages::event_announcement(&email, event, &self.site_url);
                async move {
                    let result = self.deliver(&message).await;
                    if let Err(error) = &result {
                        tracing::warn!(to = %mask_email(&message.to), error = %error, "Announcement failed");
                    }
                    result
                }
            })
            .buffer_unordered(BROADCAST_CONCURRENCY)
            .take_until(tokio::time::sleep_until(deadline))
            .collect()
            .await;

        let count = results.iter().filter(|r| r.is_ok()).count();
        let abandoned = subscribers.len() - results.len();
        if abandoned > 0 {
            tracing::warn!(slug = %event.slug, delivered = count, abandoned, "Announcement cut off at deadline");
        }
        if count == 0 {
            let reason = results
                .into_iter()
                .find_map(Result::err)
                .unwrap_or_else(|| "announcement timed out".to_string());
            return SideEffect::Failed { reason };
        }

        tracing::info!(slug = %event.slug, count, total = subscribers.len(), "Subscribers notified");
        SideEffect::Delivered { count }
    }

    pub async fn send_invitation(&self, rsvp: &Rsvp, event: &Event) -> SideEffect {
        let message = messages::rsvp_invitation(rsvp, event, &self.site_url);
        self.deliver_one(message, "rsvp_invitation").await
    }
}
