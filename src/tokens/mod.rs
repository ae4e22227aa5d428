//! One-time HMAC tokens (event check-in passes).
//!
//! # Data Flow
//! ```text
//! generate_token(event_id, user_id)
//!     → HMAC-SHA256(current secret, "event_id|user_id|issued_at")
//!     → base64url_nopad(tag ‖ ascii(issued_at))
//!
//! verify_token(token, event_id, user_id)
//!     → layout (32-byte tag + decimal issued_at)   → InvalidFormat
//!     → used store lookup                          → AlreadyUsed
//!     → issued_at + ttl vs now                     → Expired
//!     → recompute tag, constant-time compare       → SignatureMismatch
//!     → atomic insert into used store              → Ok / AlreadyUsed
//! ```
//!
//! # Design Decisions
//! - Stateless issuance; only redemptions are remembered
//! - The used store holds SHA-256 hashes, never raw tokens
//! - Callers outside the trust boundary only ever see `public_message()`

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::auth::keys::{Keyring, SIGNATURE_LEN};
use crate::clock::now_millis;
use crate::config::TokenConfig;
use crate::observability::metrics;

pub use store::{MemoryUsedTokenStore, UsedTokenStore};

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format")]
    InvalidFormat,
    #[error("token has already been used")]
    AlreadyUsed,
    #[error("token has expired")]
    Expired,
    #[error("token signature mismatch")]
    SignatureMismatch,
    #[error("token secret is not configured")]
    NotConfigured,
}

impl TokenError {
    /// The only message shown to untrusted callers.
    pub fn public_message(&self) -> &'static str {
        "Invalid or expired token"
    }

    pub fn label(&self) -> &'static str {
        match self {
            TokenError::InvalidFormat => "invalid_format",
            TokenError::AlreadyUsed => "already_used",
            TokenError::Expired => "expired",
            TokenError::SignatureMismatch => "signature_mismatch",
            TokenError::NotConfigured => "not_configured",
        }
    }
}

/// SHA-256 hex of a token, for storing references to it.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn payload(event_id: &str, user_id: &str, issued_at: u64) -> String {
    format!("{event_id}|{user_id}|{issued_at}")
}

/// Decode into the tag and the issue time.
fn parse(token: &str) -> Result<([u8; SIGNATURE_LEN], u64), TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| TokenError::InvalidFormat)?;
    if bytes.len() <= SIGNATURE_LEN {
        return Err(TokenError::InvalidFormat);
    }

    let (tag, issued) = bytes.split_at(SIGNATURE_LEN);
    if !issued.iter().all(u8::is_ascii_digit) {
        return Err(TokenError::InvalidFormat);
    }
    let issued_at = std::str::from_utf8(issued)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(TokenError::InvalidFormat)?;

    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(tag);
    Ok((signature, issued_at))
}

pub struct OneTimeTokens {
    keyring: ArcSwap<Keyring>,
    ttl: Duration,
    used: Arc<dyn UsedTokenStore>,
}

impl OneTimeTokens {
    pub fn new(keyring: Keyring, ttl: Duration, used: Arc<dyn UsedTokenStore>) -> Self {
        Self {
            keyring: ArcSwap::from_pointee(keyring),
            ttl,
            used,
        }
    }

    pub fn from_config(config: &TokenConfig) -> Self {
        if config.secrets.is_empty() {
            tracing::warn!("QR_SECRET is not configured; one-time tokens are disabled");
        }
        Self::new(
            Keyring::new(&config.secrets),
            Duration::from_secs(config.ttl_secs),
            Arc::new(MemoryUsedTokenStore::new(config.max_used_entries)),
        )
    }

    /// Swap secrets without dropping redeemed-token memory.
    pub fn replace_keyring(&self, keyring: Keyring) {
        self.keyring.store(Arc::new(keyring));
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn used_store(&self) -> &Arc<dyn UsedTokenStore> {
        &self.used
    }

    pub fn generate_token(&self, event_id: &str, user_id: &str) -> Result<String, TokenError> {
        self.generate_token_at(event_id, user_id, now_millis())
    }

    pub fn generate_token_at(
        &self,
        event_id: &str,
        user_id: &str,
        now_ms: u64,
    ) -> Result<String, TokenError> {
        let tag = self
            .keyring
            .load()
            .sign(payload(event_id, user_id, now_ms).as_bytes())
            .ok_or(TokenError::NotConfigured)?;

        let mut bytes = tag.to_vec();
        bytes.extend_from_slice(now_ms.to_string().as_bytes());
        metrics::record_token("issued");
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn verify_token(&self, token: &str, event_id: &str, user_id: &str) -> Result<(), TokenError> {
        self.verify_token_at(token, event_id, user_id, now_millis())
    }

    pub fn verify_token_at(
        &self,
        token: &str,
        event_id: &str,
        user_id: &str,
        now_ms: u64,
    ) -> Result<(), TokenError> {
        let result = self.check(token, event_id, user_id, now_ms);
        match &result {
            Ok(()) => metrics::record_token("redeemed"),
            Err(e) => metrics::record_token(e.label()),
        }
        result
    }

    fn check(&self, token: &str, event_id: &str, user_id: &str, now_ms: u64) -> Result<(), TokenError> {
        let keyring = self.keyring.load();
        if keyring.is_empty() {
            return Err(TokenError::NotConfigured);
        }

        let (signature, issued_at) = parse(token)?;
        let token_hash = hash_token(token.trim());

        if self.used.contains(&token_hash) {
            return Err(TokenError::AlreadyUsed);
        }

        let ttl_ms = self.ttl.as_millis() as u64;
        if now_ms.saturating_sub(issued_at) > ttl_ms {
            return Err(TokenError::Expired);
        }

        if !keyring.verify(payload(event_id, user_id, issued_at).as_bytes(), &signature) {
            return Err(TokenError::SignatureMismatch);
        }

        if !self.used.insert(token_hash, issued_at.saturating_add(ttl_ms)) {
            return Err(TokenError::AlreadyUsed);
        }
        Ok(())
    }

    pub fn sweep(&self) -> usize {
        self.used.sweep(now_millis())
    }
}

/// Periodically forget expired redemptions until shutdown.
pub async fn run_sweeper(
    tokens: Arc<OneTimeTokens>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = tokens.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired one-time tokens");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
