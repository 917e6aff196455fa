//! Error signature normalisation.
//!
//! Failures from the same root cause should collapse to one persisted
//! signature even when their messages embed run-specific identifiers, so
//! dynamic parts are stripped before hashing.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
    .expect("uuid pattern is valid")
});

static HEX_ID_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b[0-9a-f]{12,}\b").expect("hex id pattern is valid"));

/// Strip UUIDs and long hex identifiers from an error message.
pub fn normalise_error_message(message: &str) -> String {
  let message = UUID_PATTERN.replace_all(message, "<uuid>");
  HEX_ID_PATTERN.replace_all(&message, "<id>").into_owned()
}

/// Stable hash over (error kind, tool identity, normalised message).
pub fn signature_hash(error_type: &str, tool_name: &str, message: &str) -> String {
  let normalised = normalise_error_message(message);
  let mut hasher = Sha256::new();
  hasher.update(error_type.as_bytes());
  hasher.update(b":");
  hasher.update(tool_name.as_bytes());
  hasher.update(b":");
  hasher.update(normalised.as_bytes());
  format!("{:x}", hasher.finalize())
}
