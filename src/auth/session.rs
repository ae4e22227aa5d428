//! Stateless signed admin sessions.
//!
//! Token layout: `admin:<expiry epoch ms>:<hex HMAC-SHA256 of "admin:<expiry>">`.
//! Nothing is stored server-side; rotating the keyring's current key leaves
//! older sessions valid until their key is removed.

use std::time::Duration;

use crate::clock::now_millis;
use crate::config::SessionConfig;

use super::keys::Keyring;
use super::password::AdminPassword;
use super::AuthError;

pub const SESSION_PREFIX: &str = "admin";

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Issues and checks admin sessions and verifies the admin password.
#[derive(Debug, Clone)]
pub struct SessionAuthority {
    keyring: Keyring,
    password: AdminPassword,
    ttl: Duration,
}

impl SessionAuthority {
    pub fn new(keyring: Keyring, password: AdminPassword, ttl: Duration) -> Self {
        Self {
            keyring,
            password,
            ttl,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        if config.signing_keys.is_empty() {
            tracing::error!("SESSION_SECRET is not configured; admin sessions are disabled");
        }
        Self::new(
            Keyring::new(&config.signing_keys),
            AdminPassword::new(config.admin_password_hash.clone()),
            Duration::from_secs(config.ttl_secs),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn password(&self) -> &AdminPassword {
        &self.password
    }

    pub fn create_session_token(&self) -> Result<String, AuthError> {
        self.create_session_token_at(now_millis())
    }

    pub fn create_session_token_at(&self, now_ms: u64) -> Result<String, AuthError> {
        let expires = now_ms.saturating_add(self.ttl.as_millis() as u64);
        let payload = format!("{SESSION_PREFIX}:{expires}");
        let signature = self
            .keyring
            .sign(payload.as_bytes())
            .ok_or(AuthError::NotConfigured)?;
        Ok(format!("{payload}:{}", hex::encode(signature)))
    }

    pub fn validate_session(&self, token: &str) -> bool {
        self.validate_session_at(token, now_millis())
    }

    /// Valid iff well-formed, signed by a keyring key, and `now <= expiry`.
    pub fn validate_session_at(&self, token: &str, now_ms: u64) -> bool {
        let parts: Vec<&str> = token.split(':').collect();
        let [prefix, expires, signature] = parts.as_slice() else {
            tracing::debug!("Session token is malformed");
            return false;
        };
        if *prefix != SESSION_PREFIX {
            tracing::debug!("Session token has the wrong prefix");
            return false;
        }

        if !is_canonical_signature(signature) {
            tracing::debug!("Session signature is not lowercase hex");
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        let payload = format!("{prefix}:{expires}");
        if !self.keyring.verify(payload.as_bytes(), &signature) {
            tracing::debug!("Invalid session token signature");
            return false;
        }

        match expires.parse::<u64>() {
            Ok(expires) if now_ms <= expires => true,
            Ok(_) => {
                tracing::debug!("Session token expired");
                false
            }
            Err(_) => false,
        }
    }

    /// Check the admin password (login).
    pub async fn verify_password(&self, candidate: &str) -> bool {
        self.password.verify(candidate).await
    }

    /// Check the admin password again before a sensitive mutation.
    pub async fn re_authenticate(&self, password: &str) -> bool {
        self.verify_password(password).await
    }
}

/// Exactly the form `hex::encode` emits for a SHA-256 tag.
fn is_canonical_signature(signature: &str) -> bool {
    signature.len() == 64
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::test_support::fast_hash;

    fn authority(keys: &[&str]) -> SessionAuthority {
        SessionAuthority::new(Keyring::new(keys), AdminPassword::default(), DEFAULT_SESSION_TTL)
    }

    const NOW: u64 = 1_700_000_000_000;

    #[test]
    fn test_token_layout() {
        let token = authority(&["k"]).create_session_token_at(NOW).unwrap();
        let parts: Vec<_> = token.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "admin");
        assert_eq!(parts[1], (NOW + 604_800_000).to_string());
        assert_eq!(parts[2].len(), 64);
    }

    #[test]
    fn test_valid_until_expiry() {
        let auth = authority(&["k"]);
        let token = auth.create_session_token_at(NOW).unwrap();
        let expiry = NOW + DEFAULT_SESSION_TTL.as_millis() as u64;

        assert!(auth.validate_session_at(&token, NOW));
        assert!(auth.validate_session_at(&token, expiry));
        assert!(!auth.validate_session_at(&token, expiry + 1));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = authority(&["a"]).create_session_token_at(NOW).unwrap();
        assert!(!authority(&["b"]).validate_session_at(&token, NOW));
    }

    #[test]
    fn test_rotation() {
        let token = authority(&["old"]).create_session_token_at(NOW).unwrap();
        assert!(authority(&["new", "old"]).validate_session_at(&token, NOW));
        assert!(!authority(&["new"]).validate_session_at(&token, NOW));
    }

    #[test]
    fn test_tampering_rejected() {
        let auth = authority(&["k"]);
        let token = auth.create_session_token_at(NOW).unwrap();
        let (payload, sig) = token.rsplit_once(':').unwrap();

        let extended = format!("admin:{}:{sig}", NOW + 10 * DEFAULT_SESSION_TTL.as_millis() as u64);
        let renamed = format!("{}:{sig}", payload.replacen("admin", "user", 1));
        let extra = format!("{token}:x");
        let recased = format!("{payload}:{}", sig.to_uppercase());
        let truncated = format!("{payload}:{}", &sig[..62]);

        for bad in [
            extended.as_str(),
            renamed.as_str(),
            extra.as_str(),
            recased.as_str(),
            truncated.as_str(),
            "admin:1:zz",
            "",
            "admin",
        ] {
            assert!(!auth.validate_session_at(bad, NOW), "{bad:?} must be rejected");
        }
    }

    #[test]
    fn test_unconfigured_keyring() {
        let auth = authority(&[]);
        assert!(matches!(auth.create_session_token_at(NOW), Err(AuthError::NotConfigured)));
        assert!(!auth.validate_session_at("admin:9999999999999:00", NOW));
    }

    #[tokio::test]
    async fn test_re_authenticate() {
        let auth = SessionAuthority::new(
            Keyring::new(["k"]),
            AdminPassword::new(Some(fast_hash("pw"))),
            DEFAULT_SESSION_TTL,
        );
        assert!(auth.re_authenticate("pw").await);
        assert!(!auth.re_authenticate("").await);
    }
}
