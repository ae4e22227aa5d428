//! Admin password verification (Argon2 PHC strings).

use std::fmt;
use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use super::AuthError;

/// Well-formed hash that no password matches in practice. Verified when no
/// hash is configured so both paths cost the same.
pub const TIMING_DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// The configured admin password hash.
#[derive(Clone, Default)]
pub struct AdminPassword {
    hash: Option<Arc<str>>,
}

impl AdminPassword {
    pub fn new(hash: Option<String>) -> Self {
        Self {
            hash: hash.map(Arc::from),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.hash.is_some()
    }

    /// Compare a candidate on the current thread. Argon2 is slow by design;
    /// async callers use [`AdminPassword::verify`].
    pub fn verify_blocking(&self, candidate: &str) -> bool {
        match self.hash.as_deref() {
            Some(hash) => check(hash, candidate),
            None => {
                tracing::error!("ADMIN_PASSWORD_HASH is not configured");
                let _ = check(TIMING_DUMMY_HASH, candidate);
                false
            }
        }
    }

    /// Compare a candidate on the blocking pool.
    pub async fn verify(&self, candidate: &str) -> bool {
        let this = self.clone();
        let candidate = candidate.to_string();
        match tokio::task::spawn_blocking(move || this.verify_blocking(&candidate)).await {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}

impl fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminPassword")
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn check(phc: &str, candidate: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Configured password hash does not parse");
            false
        }
    }
}

/// Produce a PHC string for `password` with default Argon2id parameters.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}
