//! Admin authentication subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/admin/login {password}
//!     → password.rs (Argon2 verify on the blocking pool)
//!     → session.rs (sign "admin:<expiry>" with the keyring's current key)
//!     → cookie.rs (HttpOnly, SameSite=Strict, Secure in production)
//!
//! Admin request:
//!     → cookie.rs (read admin_session)
//!     → session.rs (verify against every keyring key, check expiry)
//!     → mutations additionally re-verify the password
//! ```
//!
//! # Design Decisions
//! - No server-side session rows; revocation is key rotation
//! - Every failure reads as "unauthenticated"; missing secrets are only
//!   logged server-side
//! - Missing hash and wrong password take the same time

pub mod cookie;
pub mod keys;
pub mod password;
pub mod session;

pub use cookie::{read_session_cookie, SessionCookie, SESSION_COOKIE};
pub use keys::Keyring;
pub use password::{hash_password, AdminPassword};
pub use session::{SessionAuthority, DEFAULT_SESSION_TTL};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("session signing key is not configured")]
    NotConfigured,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}
