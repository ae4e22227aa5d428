//! Shared utilities for the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tower::ServiceExt;

use dev_gathering::config::{ForwardedForPolicy, GatheringConfig};
use dev_gathering::mail::{MailError, MailMessage, Mailer};
use dev_gathering::store::MemoryRepository;
use dev_gathering::HttpServer;

pub const PASSWORD: &str = "correct horse battery staple";
pub const SESSION_KEY: &str = "integration-session-key";
pub const QR_SECRET: &str = "integration-qr-secret";
pub const ADMIN_EMAIL: &str = "admin@devgathering.test";

/// Argon2id with cheap parameters; verification reads them from the hash.
pub fn cheap_hash(password: &str) -> String {
    let params = Params::new(1024, 1, 1, None).unwrap();
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

/// Configuration with every secret set and auditing off unless `audit_dir` is given.
pub fn test_config(audit_dir: Option<&Path>) -> GatheringConfig {
    let mut config = GatheringConfig::default();
    config.session.signing_keys = vec![SESSION_KEY.to_string()];
    config.session.admin_password_hash = Some(cheap_hash(PASSWORD));
    config.tokens.secrets = vec![QR_SECRET.to_string()];
    config.rate_limit.forwarded_for = ForwardedForPolicy::Always;
    config.rate_limit.max_requests = 1_000;
    config.mail.admin_address = Some(ADMIN_EMAIL.to_string());
    match audit_dir {
        Some(dir) => {
            config.audit.directory = dir.display().to_string();
            config.audit.ip_hash_salt = Some("integration-salt".to_string());
        }
        None => config.audit.enabled = false,
    }
    config
}

/// Keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }

    pub fn recipients_of(&self, subject_prefix: &str) -> Vec<String> {
        let mut to: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.subject.starts_with(subject_prefix))
            .map(|m| m.to.clone())
            .collect();
        to.sort();
        to
    }
}

impl Mailer for RecordingMailer {
    fn send<'a>(&'a self, message: &'a MailMessage) -> BoxFuture<'a, Result<(), MailError>> {
        self.sent.lock().unwrap().push(message.clone());
        async { Ok(()) }.boxed()
    }
}

/// Rejects every message.
pub struct FailingMailer;

impl Mailer for FailingMailer {
    fn send<'a>(&'a self, _message: &'a MailMessage) -> BoxFuture<'a, Result<(), MailError>> {
        async {
            Err(MailError::Rejected {
                status: 422,
                body: "domain not verified".to_string(),
            })
        }
        .boxed()
    }
}

/// Accepts every message after `delay`.
pub struct StalledMailer {
    pub delay: std::time::Duration,
}

impl Mailer for StalledMailer {
    fn send<'a>(&'a self, _message: &'a MailMessage) -> BoxFuture<'a, Result<(), MailError>> {
        async move {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
        .boxed()
    }
}

pub struct TestApp {
    pub router: Router,
    pub repository: Arc<MemoryRepository>,
}

pub fn app_with(config: GatheringConfig, mailer: Arc<dyn Mailer>) -> TestApp {
    let repository = Arc::new(MemoryRepository::new());
    let server = HttpServer::with_components(config, repository.clone(), mailer);
    TestApp {
        router: server.router(),
        repository,
    }
}

pub fn app(mailer: Arc<dyn Mailer>) -> TestApp {
    app_with(test_config(None), mailer)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }

    /// `name=value` of the session cookie that was set, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

/// Request builder with a fixed forwarded address and an optional session.
pub struct Call {
    method: Method,
    uri: String,
    body: Option<Value>,
    raw: Option<&'static str>,
    cookie: Option<String>,
    ip: String,
}

impl Call {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
            raw: None,
            cookie: None,
            ip: "203.0.113.10".to_string(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn raw(mut self, body: &'static str) -> Self {
        self.raw = Some(body);
        self
    }

    pub fn cookie(mut self, cookie: &str) -> Self {
        self.cookie = Some(cookie.to_string());
        self
    }

    pub fn from_ip(mut self, ip: &str) -> Self {
        self.ip = ip.to_string();
        self
    }

    pub async fn send(self, router: &Router) -> TestResponse {
        let mut builder = Request::builder()
            .method(self.method)
            .uri(self.uri)
            .header("x-forwarded-for", self.ip);
        if let Some(cookie) = self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match (self.body, self.raw) {
            (Some(json), _) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            (None, Some(raw)) => Body::from(raw),
            (None, None) => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Log in and return the `admin_session=...` cookie pair.
pub async fn login(router: &Router) -> String {
    let response = Call::post("/api/admin/login")
        .json(serde_json::json!({ "password": PASSWORD }))
        .send(router)
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    response.session_cookie().unwrap()
}
