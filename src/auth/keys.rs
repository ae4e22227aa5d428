//! HMAC keyring with rotation.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag in bytes.
pub const SIGNATURE_LEN: usize = 32;

/// Ordered signing keys. The first key signs; every key verifies.
///
/// An empty keyring signs nothing and verifies nothing.
#[derive(Clone, Default)]
pub struct Keyring {
    keys: Vec<Vec<u8>>,
}

impl Keyring {
    /// Build from current-first keys. Empty keys are skipped.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.as_ref().to_vec())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Sign with the current key.
    pub fn sign(&self, payload: &[u8]) -> Option<[u8; SIGNATURE_LEN]> {
        self.keys.first().map(|key| mac(key, payload))
    }

    /// Check a signature against every key without short-circuiting.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        let matched = self.keys.iter().fold(Choice::from(0), |acc, key| {
            acc | mac(key, payload).as_slice().ct_eq(signature)
        });
        bool::from(matched)
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring").field("keys", &self.keys.len()).finish()
    }
}

fn mac(key: &[u8], payload: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(payload);
    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
