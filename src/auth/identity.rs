//! User identity (`username@org`) parsing and the session selector.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::error::AuthError;

/// Fully-qualified user identity. Case-sensitive on both halves.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId {
    pub username: String,
    pub org: String,
}

impl UserId {
    /// Build an identity from already-validated parts.
    #[must_use]
    pub fn new(username: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            org: org.into(),
        }
    }

    /// Salt form used by clients for the PBKDF2 derivation (`user@org`).
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}@{}", self.username, self.org)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.org)
    }
}

fn valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl FromStr for UserId {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((username, org)) = s.split_once('@') else {
            return Err(AuthError::Validation(format!(
                "invalid user identity {s:?}: expected user@org"
            )));
        };

        if !valid_part(username) || !valid_part(org) {
            return Err(AuthError::Validation(format!(
                "invalid user identity {s:?}: expected user@org"
            )));
        }

        Ok(Self::new(username, org))
    }
}

/// Target of a per-session request: either an explicit session id or the
/// literal `current`, which resolves to the session behind the presented key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSelector {
    Current,
    Id(Uuid),
}

impl FromStr for SessionSelector {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "current" {
            return Ok(Self::Current);
        }
        Uuid::parse_str(s).map(Self::Id).map_err(|_| {
            AuthError::Validation(format!("invalid session id {s:?}: expected a UUID or current"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_identity() {
        let id: UserId = "alice@org1".parse().expect("should parse");
        assert_eq!(id.username, "alice");
        assert_eq!(id.org, "org1");
        assert_eq!(id.to_string(), "alice@org1");
    }

    #[test]
    fn rejects_malformed_identities() {
        for raw in ["", "alice", "@org1", "alice@", "alice@@org1", "a lice@org1"] {
            assert!(raw.parse::<UserId>().is_err(), "should reject {raw:?}");
        }
    }

    #[test]
    fn qualified_matches_display() {
        let id = UserId::new("bob", "example.net");
        assert_eq!(id.qualified(), "bob@example.net");
        assert_eq!(id.qualified(), id.to_string());
    }

    #[test]
    fn selector_parses_current_and_uuid() {
        assert_eq!(
            "current".parse::<SessionSelector>().expect("current"),
            SessionSelector::Current
        );

        let uuid = Uuid::new_v4();
        assert_eq!(
            uuid.to_string().parse::<SessionSelector>().expect("uuid"),
            SessionSelector::Id(uuid)
        );
    }

    #[test]
    fn selector_rejects_garbage() {
        assert!("latest".parse::<SessionSelector>().is_err());
        assert!("1234".parse::<SessionSelector>().is_err());
    }
}
