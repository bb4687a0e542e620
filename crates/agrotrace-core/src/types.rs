use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::AgroError;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Sequential product identifier, issued from 0 and never reused.
pub type ProductId = u64;

/// Reputation score carried on a participant record.
pub type Reputation = u64;

// ── Principal ────────────────────────────────────────────────────────────────

/// 32-byte opaque caller identity.
///
/// The dispatcher authenticates callers before a call reaches the engine;
/// the core trusts whatever principal it is handed. Human-readable formats
/// (JSON) carry the base-58 string, binary formats the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(pub [u8; 32]);

impl Principal {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Deterministic principal for a label: BLAKE3(label).
    /// Used for development identities and tests.
    pub fn derive(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, AgroError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AgroError::InvalidPrincipal(e.to_string()))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            AgroError::InvalidPrincipal(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AgroError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            AgroError::InvalidPrincipal(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.to_b58();
        write!(f, "Principal({})", &s[..s.len().min(8)])
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_b58())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Principal::from_b58(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Principal)
        }
    }
}
