//! Identifier value objects.
//!
//! IDs are thin newtypes so the compiler catches a `ServerIdentity`
//! passed where a `RequestId` was expected, even though both are
//! strings on the wire.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identifier for a configured upstream server.
///
/// Derived from `(name, config_path)` so that in-place config edits
/// never change it (§3, §9: "Stable identity vs. renameable display").
/// Renaming a server is modeled as remove + add, which intentionally
/// mints a new identity and starts fresh activity history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerIdentity(pub String);

impl ServerIdentity {
    /// Derives a stable identity from a server's name and the path of
    /// the config file it was declared in.
    #[must_use]
    pub fn derive(name: &str, config_path: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(config_path.as_bytes());
        let digest = hasher.finalize();
        Self(format!("{name}-{}", hex::encode(&digest[..8])))
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation id for a call chain, optionally supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Per-request correlation id, minted fresh for every inbound call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    /// Mints a new random request id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time-ordered, lexicographically sortable activity record id.
///
/// Built from a millisecond timestamp plus a monotonic counter so two
/// records published in the same millisecond still sort in publish
/// order (§3 invariant: "total order is by `id`").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

impl ActivityId {
    /// Builds an id from an epoch-millisecond timestamp and sequence counter.
    #[must_use]
    pub fn new(timestamp_ms: u64, sequence: u64) -> Self {
        Self(format!("{timestamp_ms:020}-{sequence:010}"))
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_identity_survives_in_place_edits() {
        let a = ServerIdentity::derive("gh", "/etc/mcproxy/config.json");
        let b = ServerIdentity::derive("gh", "/etc/mcproxy/config.json");
        assert_eq!(a, b);
    }

    #[test]
    fn server_identity_differs_per_name() {
        let a = ServerIdentity::derive("gh", "/etc/mcproxy/config.json");
        let b = ServerIdentity::derive("slack", "/etc/mcproxy/config.json");
        assert_ne!(a, b);
    }

    #[test]
    fn activity_ids_sort_by_time_then_sequence() {
        let a = ActivityId::new(1000, 1);
        let b = ActivityId::new(1000, 2);
        let c = ActivityId::new(1001, 0);
        assert!(a < b);
        assert!(b < c);
    }
}
