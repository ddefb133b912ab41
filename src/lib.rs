//! # Janua (Multi-Tenant Authentication Service)
//!
//! `janua` is an authentication back-end for multi-tenant (`user@org`)
//! services. It authenticates users via pre-derived password hashes, issues
//! and validates bearer session keys with sliding expiration, provisions
//! users hierarchically (a child user is created under a `parentuser` who
//! proves ownership with a live session), and runs a self-service password
//! reset flow over single-use, time-limited tokens.
//!
//! ## Tenant Model
//!
//! Identities are `username@org`, case-sensitive. Organizations gate
//! registration through a `registration_open` flag consulted (never managed)
//! by user provisioning.
//!
//! ## Credentials
//!
//! Clients never send a raw password: they submit a PBKDF2 hash derived with
//! `user@org` as the salt and count=10000. The server treats it as an opaque
//! blob, wraps it once more before storage, and compares in constant time.
//! Wrong-password and unknown-user responses are deliberately coarse so
//! accounts cannot be enumerated.
//!
//! ## Storage
//!
//! All state lives behind one store trait with PostgreSQL and in-memory
//! implementations; the two hot paths (sliding-expiry extension and reset
//! consumption) are atomic check-and-set operations in both.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
