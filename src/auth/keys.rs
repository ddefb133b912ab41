//! Session key generation, hashing, and credential wrapping helpers.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Raw session key length before encoding. 32 bytes keeps the bearer secret
/// well above the 128-bit floor the uniqueness guarantee relies on.
const KEY_BYTES: usize = 32;

/// Create a fresh high-entropy session key.
///
/// The raw value is returned to the client exactly once; the store only ever
/// sees its hash.
pub fn generate_session_key() -> Result<String> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session key")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session key so raw values never touch the store.
#[must_use]
pub fn hash_session_key(key: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().to_vec()
}

/// Server-side wrap applied to client-submitted credential hashes before
/// storage, so the at-rest form is never the form a client submits.
#[must_use]
pub fn wrap_credential(submitted: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(submitted.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Constant-time byte comparison for credential checks.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Current unix time in seconds.
#[must_use]
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
