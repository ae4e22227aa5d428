//! Client for a Resend-compatible transactional email API.
//!
//! `POST {api_url}` with a bearer key and
//! `{"from", "to": [..], "subject", "html"}`; any 2xx is a delivery.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;

use super::{MailError, MailMessage, Mailer};
use crate::config::MailConfig;
use crate::resilience::{retry, RetryPolicy};

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    retry: RetryPolicy,
}

impl HttpMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
            retry,
        })
    }

    pub fn from_config(config: &MailConfig, api_key: &str) -> Result<Self, MailError> {
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
            ..RetryPolicy::default()
        };
        Self::new(&config.api_url, api_key, &config.from_address, retry)
    }

    async fn send_once(&self, message: &MailMessage) -> Result<(), MailError> {
        let body = SendRequest {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl Mailer for HttpMailer {
    fn send<'a>(&'a self, message: &'a MailMessage) -> BoxFuture<'a, Result<(), MailError>> {
        async move {
            retry(self.retry, move || self.send_once(message), MailError::is_transient).await
        }
        .boxed()
    }
}
