//! Deterministic node keys derived from `(name, value)`

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// UUID v5 namespace for node keys. Changing it re-keys every stored node.
const NODE_KEY_NS: Uuid = Uuid::from_bytes([
    0x3d, 0x6f, 0x2a, 0x91, 0x5c, 0x0e, 0x4b, 0x7a,
    0x9e, 0x12, 0x6b, 0xd4, 0x81, 0x3f, 0xa0, 0x57,
]);

/// Separator between name and value in the hash input (ASCII unit separator).
const HASH_SEPARATOR: char = '\u{1f}';

/// Why a key could not be computed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidKeyError {
    #[error("node name is empty")]
    EmptyName,

    #[error("node value is empty")]
    EmptyValue,

    #[error("malformed node key '{0}' (expected <name>|<uuid>)")]
    Malformed(String),
}

/// Normalize an identifying field: trim, collapse whitespace runs, lowercase.
///
/// Total for every input string; never fails.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Primary lookup key of a node
///
/// Serializes as a plain string of the form `<name>|<uuid>`. The readable
/// prefix is the normalized name; uniqueness comes from the UUID v5 hash
/// over the normalized name and value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Compute the key for an identifying `(name, value)` pair
    pub fn compute(name: &str, value: &str) -> Result<Self, InvalidKeyError> {
        let name = normalize(name);
        let value = normalize(value);
        if name.is_empty() {
            return Err(InvalidKeyError::EmptyName);
        }
        if value.is_empty() {
            return Err(InvalidKeyError::EmptyValue);
        }
        Ok(Self::from_normalized(&name, &value))
    }

    /// Build a key from fields that are already normalized and non-empty
    pub(crate) fn from_normalized(name: &str, value: &str) -> Self {
        let mut hash_input = String::with_capacity(name.len() + value.len() + 1);
        hash_input.push_str(name);
        hash_input.push(HASH_SEPARATOR);
        hash_input.push_str(value);
        let digest = Uuid::new_v5(&NODE_KEY_NS, hash_input.as_bytes());

        Self(format!("{}|{}", name, digest))
    }

    /// Parse a key written out by `compute`, checking its `<name>|<uuid>` shape
    pub fn parse(raw: &str) -> Result<Self, InvalidKeyError> {
        let malformed = || InvalidKeyError::Malformed(raw.to_string());
        let (name, digest) = raw.rsplit_once('|').ok_or_else(malformed)?;
        if name.is_empty() || normalize(name) != name || Uuid::parse_str(digest).is_err() {
            return Err(malformed());
        }
        Ok(Self(raw.to_string()))
    }

    /// Wrap an already-computed key read back from storage
    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
