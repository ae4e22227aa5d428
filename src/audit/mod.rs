//! Append-only audit trail.
//!
//! # Data Flow
//! ```text
//! log_event(event, data, ip?)
//!     → redact.rs (mask email, replace name/ip/password)
//!     → action hash over {action, ...redacted, timestamp}
//!     → salted address hash (only when a salt is configured)
//!     → one JSON line for <directory>/<YYYY-MM-DD>.log (UTC)
//!     → queued to the writer task when it runs, appended inline otherwise
//! ```
//!
//! # Design Decisions
//! - Logging never fails the caller; write errors go to tracing and a metric
//! - Raw addresses and PII never reach the file
//! - Appends are serialized by a mutex so lines never interleave
//! - The writer does file I/O on the blocking pool and flushes its queue
//!   before exiting

pub mod redact;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::AuditConfig;
use crate::observability::metrics;

pub use redact::{mask_email, REDACTED};

/// Kinds of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    NotifySubmit,
    RequestSubmit,
    AdminLogin,
    AdminLoginFailed,
    AdminLogout,
    EventCreated,
    EventCreationFailed,
    EventUpdated,
    EventDeleted,
    EventPublished,
    SubscribersNotified,
    RsvpSubmitted,
    RsvpApproved,
    RsvpRejected,
    RsvpInvitationSent,
    RsvpInvitationResent,
    RateLimited,
    ValidationFailed,
    TokenIssued,
    TokenRedeemed,
    TokenRejected,
    Error,
}

impl AuditEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEvent::NotifySubmit => "notify_submit",
            AuditEvent::RequestSubmit => "request_submit",
            AuditEvent::AdminLogin => "admin_login",
            AuditEvent::AdminLoginFailed => "admin_login_failed",
            AuditEvent::AdminLogout => "admin_logout",
            AuditEvent::EventCreated => "event_created",
            AuditEvent::EventCreationFailed => "event_creation_failed",
            AuditEvent::EventUpdated => "event_updated",
            AuditEvent::EventDeleted => "event_deleted",
            AuditEvent::EventPublished => "event_published",
            AuditEvent::SubscribersNotified => "subscribers_notified",
            AuditEvent::RsvpSubmitted => "rsvp_submitted",
            AuditEvent::RsvpApproved => "rsvp_approved",
            AuditEvent::RsvpRejected => "rsvp_rejected",
            AuditEvent::RsvpInvitationSent => "rsvp_invitation_sent",
            AuditEvent::RsvpInvitationResent => "rsvp_invitation_resent",
            AuditEvent::RateLimited => "rate_limited",
            AuditEvent::ValidationFailed => "validation_failed",
            AuditEvent::TokenIssued => "token_issued",
            AuditEvent::TokenRedeemed => "token_redeemed",
            AuditEvent::TokenRejected => "token_rejected",
            AuditEvent::Error => "error",
        }
    }
}

/// One line of the audit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub event: AuditEvent,
    pub timestamp: String,
    pub action_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A serialized entry waiting to be appended.
#[derive(Debug)]
struct PendingLine {
    event: AuditEvent,
    path: PathBuf,
    line: String,
}

pub struct AuditLogger {
    /// `None` disables persistence; entries are still built and traced.
    directory: Option<PathBuf>,
    ip_hash_salt: Option<String>,
    write_lock: Mutex<()>,
    queue: OnceCell<mpsc::UnboundedSender<PendingLine>>,
}

impl AuditLogger {
    pub fn new(directory: impl Into<PathBuf>, ip_hash_salt: Option<String>) -> Self {
        Self {
            directory: Some(directory.into()),
            ip_hash_salt,
            write_lock: Mutex::new(()),
            queue: OnceCell::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            directory: None,
            ip_hash_salt: None,
            write_lock: Mutex::new(()),
            queue: OnceCell::new(),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        if config.ip_hash_salt.is_none() {
            tracing::warn!("IP_HASH_SALT is not set; audit entries will carry no address hash");
        }
        Self::new(&config.directory, config.ip_hash_salt.clone())
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Path of the file holding entries for `date`.
    pub fn file_for(&self, date: NaiveDate) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", date.format("%Y-%m-%d"))))
    }

    /// Build the redacted entry without writing it.
    pub fn build_entry(
        &self,
        event: AuditEvent,
        data: Value,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> LogEntry {
        let redacted = redact::redact(data);
        let action_hash =
            redact::action_hash(event.as_str(), &redacted, now.timestamp_millis().max(0) as u64);

        let ip_hash = match (ip, &self.ip_hash_salt) {
            (Some(ip), Some(salt)) => Some(redact::ip_hash(ip, salt)),
            _ => None,
        };

        LogEntry {
            event,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            action_hash,
            ip_hash,
            data: (!redacted.is_empty()).then_some(redacted),
        }
    }

    /// Record an action. Failures are reported, never returned.
    ///
    /// With the writer running this only queues the line.
    pub fn log_event(&self, event: AuditEvent, data: Value, ip: Option<&str>) {
        let pending = match self.prepare(event, data, ip, Utc::now()) {
            Ok(Some(pending)) => pending,
            Ok(None) => return,
            Err(e) => return report_failure(event, &e),
        };
        let pending = match self.queue.get() {
            Some(queue) => match queue.send(pending) {
                Ok(()) => return,
                Err(mpsc::error::SendError(pending)) => pending,
            },
            None => pending,
        };
        if let Err(e) = self.append(&pending) {
            report_failure(event, &e);
        }
    }

    /// Record an action at a given time, appending inline and surfacing
    /// write errors.
    pub fn try_log_event_at(
        &self,
        event: AuditEvent,
        data: Value,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        match self.prepare(event, data, ip, now)? {
            Some(pending) => self.append(&pending),
            None => Ok(()),
        }
    }

    fn prepare(
        &self,
        event: AuditEvent,
        data: Value,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingLine>, AuditError> {
        let entry = self.build_entry(event, data, ip, now);
        let Some(path) = self.file_for(now.date_naive()) else {
            tracing::debug!(event = event.as_str(), "Audit persistence disabled");
            return Ok(None);
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        Ok(Some(PendingLine { event, path, line }))
    }

    fn append(&self, pending: &PendingLine) -> Result<(), AuditError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = pending.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&pending.path)?;
        file.write_all(pending.line.as_bytes())?;
        Ok(())
    }

    /// Start the background writer. Returns `None` when persistence is
    /// disabled or a writer already runs.
    ///
    /// The returned task finishes after `shutdown` fires and every queued
    /// line is written; later entries are appended inline.
    pub fn start_writer(
        self: &Arc<Self>,
        shutdown: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<()>> {
        self.directory.as_ref()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.queue.set(tx).ok()?;
        Some(tokio::spawn(run_writer(self.clone(), rx, shutdown)))
    }

    /// Record a server-side failure with its detail. `context` is redacted
    /// like any other data.
    pub fn log_error(&self, message: &str, detail: Option<&str>, context: Value) {
        let mut data = redact::redact(context);
        data.insert("message".to_string(), Value::String(message.to_string()));
        if let Some(detail) = detail {
            data.insert("detail".to_string(), Value::String(detail.to_string()));
        }
        self.log_event(AuditEvent::Error, Value::Object(data), None);
    }
}

fn report_failure(event: AuditEvent, error: &AuditError) {
    metrics::record_audit_write_failure();
    tracing::error!(event = event.as_str(), error = %error, "Audit logging failed");
}

async fn write_off_thread(logger: &Arc<AuditLogger>, pending: PendingLine) {
    let event = pending.event;
    let writer = logger.clone();
    match tokio::task::spawn_blocking(move || writer.append(&pending)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => report_failure(event, &e),
        Err(e) => report_failure(event, &AuditError::Io(std::io::Error::other(e))),
    }
}

async fn run_writer(
    logger: Arc<AuditLogger>,
    mut lines: mpsc::UnboundedReceiver<PendingLine>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            Some(pending) = lines.recv() => write_off_thread(&logger, pending).await,
            _ = shutdown.recv() => break,
        }
    }

    lines.close();
    let mut flushed = 0usize;
    while let Ok(pending) = lines.try_recv() {
        write_off_thread(&logger, pending).await;
        flushed += 1;
    }
    tracing::debug!(flushed, "Audit writer stopped");
}
