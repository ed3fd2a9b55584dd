//! Secret string wrapper for API keys.
//!
//! [`SecretString`] keeps provider keys out of logs, `Debug` output, and
//! serialized configuration dumps.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A string value that should not appear in logs, Debug output, or serialized JSON.
///
/// - `Debug` prints `[REDACTED]` (or `""` if empty)
/// - `Serialize` emits an empty string (never the actual value)
/// - `Deserialize` accepts a plain string
/// - [`expose()`](SecretString::expose) returns the inner value for actual use
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new `SecretString` wrapping the given value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the actual secret value. Only call this where the key is
    /// needed on the wire (Authorization headers, query parameters).
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the wrapped value is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Mask the key for display, keeping the first and last 4 characters.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let prefix: String = chars[..4].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{prefix}{}...{suffix}", "*".repeat((chars.len() - 8).min(8)))
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "\"\"")
        } else {
            write!(f, "\"[REDACTED]\"")
        }
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            write!(f, "[REDACTED]")
        }
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        SecretString(s.to_string())
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_non_empty() {
        let s = SecretString::new("sk-live-key");
        assert_eq!(format!("{s:?}"), "\"[REDACTED]\"");
    }

    #[test]
    fn display_empty_for_empty() {
        assert_eq!(SecretString::default().to_string(), "");
    }

    #[test]
    fn serialize_never_leaks() {
        let json = serde_json::to_string(&SecretString::new("sk-abc")).unwrap();
        assert_eq!(json, "\"\"");
    }

    #[test]
    fn deserialize_accepts_plain_string() {
        let s: SecretString = serde_json::from_str("\"sk-abc\"").unwrap();
        assert_eq!(s.expose(), "sk-abc");
    }

    #[test]
    fn blank_detection() {
        assert!(SecretString::default().is_blank());
        assert!(SecretString::new("   ").is_blank());
        assert!(!SecretString::new("k").is_blank());
    }

    #[test]
    fn masked_keeps_edges() {
        let s = SecretString::new("sk-1234567890abcdef");
        assert_eq!(s.masked(), "sk-1********...cdef");
        assert_eq!(SecretString::new("short").masked(), "*****");
    }
}
