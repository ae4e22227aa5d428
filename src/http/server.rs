//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the public and admin handlers
//! - Wire up middleware (security headers, request id, tracing, limits,
//!   rate limiting, metrics)
//! - Run background sweepers, the audit writer and the credential reload task
//! - Serve plain TCP or TLS with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatheringConfig;
use crate::http::handlers;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::track_metrics;
use crate::http::state::AppState;
use crate::mail::{mailer_from_config, MailError, Mailer};
use crate::net::tls::load_tls_config;
use crate::security::headers::with_security_headers;
use crate::security::rate_limit::{self, rate_limit_middleware, RateLimitState};
use crate::store::{EventRepository, MemoryRepository};
use crate::tokens;

/// How long in-flight TLS connections get to finish after shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(10);

/// HTTP server for the gathering API.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: GatheringConfig,
}

impl HttpServer {
    /// Create a server with the in-memory repository and the configured mailer.
    pub fn new(config: GatheringConfig) -> Result<Self, MailError> {
        let mailer = mailer_from_config(&config.mail)?;
        Ok(Self::with_components(
            config,
            Arc::new(MemoryRepository::new()),
            mailer,
        ))
    }

    /// Create a server around an existing repository and mailer.
    pub fn with_components(
        config: GatheringConfig,
        repository: Arc<dyn EventRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let state = AppState::from_config(&config, repository, mailer);
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatheringConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/api/health", get(handlers::health))
            .route("/api/notify", post(handlers::notify))
            .route("/api/request", post(handlers::request_city))
            .route("/api/rsvp", post(handlers::rsvp))
            .route("/api/events", get(handlers::list_events))
            .route("/api/events/{slug}", get(handlers::event_by_slug))
            .route("/api/waitlist-count", get(handlers::waitlist_count))
            .nest("/api/admin", admin::router())
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state.clone());

        let api = if config.rate_limit.enabled {
            let limit_state = RateLimitState {
                limiter: state.rate_limiter.clone(),
                resolver: state.client_ip.clone(),
                path_prefix: Arc::from(config.rate_limit.path_prefix.as_str()),
                audit: state.audit.clone(),
            };
            api.layer(middleware::from_fn_with_state(
                limit_state,
                rate_limit_middleware,
            ))
        } else {
            api
        };

        let request_id = HeaderName::from_static(X_REQUEST_ID);
        let router = api
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid));

        if config.security.enable_headers {
            with_security_headers(router, config.environment)
        } else {
            router
        }
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GatheringConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Reloaded configurations arriving on `config_updates` swap credentials
    /// in place. The server drains and returns once `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatheringConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.environment,
            tls = self.config.listener.tls.is_some(),
            "HTTP server starting"
        );

        // Background tasks stop on their own shutdown receiver.
        let (stop_tx, _) = broadcast::channel::<()>(1);
        tokio::spawn(rate_limit::run_sweeper(
            self.state.rate_limiter.clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
            stop_tx.subscribe(),
        ));
        tokio::spawn(tokens::run_sweeper(
            self.state.tokens.clone(),
            Duration::from_secs(self.config.tokens.sweep_interval_secs),
            stop_tx.subscribe(),
        ));
        let audit_writer = self.state.audit.start_writer(stop_tx.subscribe());

        let reload_state = self.state.clone();
        let mut reload_stop = stop_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => reload_state.apply_reload(&new_config),
                        None => break,
                    },
                    _ = reload_stop.recv() => break,
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await?;
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    tracing::info!("Shutdown signal received");
                    drain.graceful_shutdown(Some(TLS_DRAIN));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        tracing::info!("Shutdown signal received");
                    })
                    .await?;
            }
        }

        let _ = stop_tx.send(());
        if let Some(writer) = audit_writer {
            if let Err(e) = writer.await {
                tracing::error!(error = %e, "Audit writer failed");
            }
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
