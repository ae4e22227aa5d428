//! Shared handler state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::Instant;

use crate::audit::AuditLogger;
use crate::auth::{Keyring, SessionAuthority, SessionCookie};
use crate::config::GatheringConfig;
use crate::mail::{Mailer, Notifier, SideEffect};
use crate::resilience::{with_deadline, DownstreamError};
use crate::security::{ClientIpResolver, RateLimiter};
use crate::store::{EventRepository, RepositoryError};
use crate::tokens::OneTimeTokens;

/// Application state injected into handlers.
///
/// Cloning is cheap; every component is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Swapped on config reload.
    pub auth: Arc<ArcSwap<SessionAuthority>>,
    pub cookie: SessionCookie,
    pub tokens: Arc<OneTimeTokens>,
    pub rate_limiter: Arc<RateLimiter>,
    pub client_ip: Arc<ClientIpResolver>,
    pub audit: Arc<AuditLogger>,
    pub repository: Arc<dyn EventRepository>,
    pub notifier: Arc<Notifier>,
    pub downstream_timeout: Duration,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn from_config(
        config: &GatheringConfig,
        repository: Arc<dyn EventRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let downstream_timeout = Duration::from_secs(config.timeouts.downstream_secs);
        Self {
            auth: Arc::new(ArcSwap::from_pointee(SessionAuthority::from_config(
                &config.session,
            ))),
            cookie: SessionCookie::from_config(config),
            tokens: Arc::new(OneTimeTokens::from_config(&config.tokens)),
            rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            client_ip: Arc::new(ClientIpResolver::from_config(&config.rate_limit)),
            audit: Arc::new(AuditLogger::from_config(&config.audit)),
            repository,
            notifier: Arc::new(Notifier::from_config(mailer, &config.mail, downstream_timeout)),
            downstream_timeout,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    /// Current session authority.
    pub fn session(&self) -> Arc<SessionAuthority> {
        self.auth.load_full()
    }

    /// Run a repository call under the downstream deadline.
    pub async fn repo<T, F>(&self, call: F) -> Result<T, DownstreamError<RepositoryError>>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        with_deadline(self.downstream_timeout, call).await
    }

    /// Latest instant side effects of a handler entered at `started` may run
    /// to, leaving a fifth of the request timeout to respond.
    pub fn side_effect_deadline(&self, started: Instant) -> Instant {
        started + (self.request_timeout - self.request_timeout / 5)
    }

    /// Run a best-effort side effect, giving up at `deadline`.
    pub async fn side_effect<F>(&self, deadline: Instant, effect: F) -> SideEffect
    where
        F: Future<Output = SideEffect>,
    {
        match tokio::time::timeout_at(deadline, effect).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("Side effect cut off to answer within the request timeout");
                SideEffect::Failed {
                    reason: "timed out before the response was due".to_string(),
                }
            }
        }
    }

    /// Apply the reloadable parts of a new configuration: the session keyring,
    /// the admin password hash and the token secrets.
    pub fn apply_reload(&self, config: &GatheringConfig) {
        self.auth
            .store(Arc::new(SessionAuthority::from_config(&config.session)));
        self.tokens
            .replace_keyring(Keyring::new(&config.tokens.secrets));
        tracing::info!(
            signing_keys = config.session.signing_keys.len(),
            token_secrets = config.tokens.secrets.len(),
            "Credentials reloaded"
        );
    }
}
