//! Mailer used when no API key is configured.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::{MailError, MailMessage, Mailer};
use crate::audit::redact::mask_email;

/// Logs each message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, message: &'a MailMessage) -> BoxFuture<'a, Result<(), MailError>> {
        async move {
            tracing::info!(
                to = %mask_email(&message.to),
                subject = %message.subject,
                "Mail delivery disabled; message logged only"
            );
            Ok(())
        }
        .boxed()
    }
}
