//! Hashing utilities for configuration fingerprints.
//!
//! Fingerprints are computed from a list of canonical entries rather than from
//! a serializer's output, so the digest depends only on the entries themselves
//! and not on map iteration order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A configuration fingerprint.
///
/// A lowercase hexadecimal SHA-256 digest (64 characters). Two fingerprints are
/// equal exactly when the configuration that determines container identity is
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Encode a tagged entry so that no two distinct part lists collide.
///
/// Each part is length-prefixed: `tag:3#abc,0#`.
pub fn entry(tag: &str, parts: &[&str]) -> String {
  let encoded: Vec<String> = parts.iter().map(|p| format!("{}#{}", p.len(), p)).collect();
  format!("{}:{}", tag, encoded.join(","))
}

/// Hash a list of entries.
///
/// Entries are sorted before hashing, so callers may collect them in any order.
pub fn hash_entries(mut entries: Vec<String>) -> Fingerprint {
  entries.sort();

  let mut hasher = Sha256::new();
  for entry in entries {
    hasher.update(entry.as_bytes());
    hasher.update(b"\n");
  }

  Fingerprint(hex::encode(hasher.finalize()))
}
