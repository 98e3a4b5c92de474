//! Secret handling for operator keys
//!
//! [`Secret`] deserializes transparently from configuration but never shows
//! its contents through `Debug`, `Display` or `Serialize`. The value is only
//! reachable through [`Secret::expose`], which keeps every read site greppable.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const REDACTED: &str = "<redacted>";

/// Wrapper for values that must stay out of logs and structured output
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Secret(value)
    }

    /// Borrow the wrapped value
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// True when the wrapped string is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Secret(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> Serialize for Secret<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_debug_and_display_hide_value() {
        let secret = Secret::new(KEY.to_string());
        assert_eq!(format!("{:?}", secret), "<redacted>");
        assert_eq!(format!("{}", secret), "<redacted>");
        assert_eq!(secret.expose(), KEY);
    }

    #[test]
    fn test_deserialize_is_transparent() {
        let secret: Secret<String> = serde_json::from_str(&format!("\"{}\"", KEY)).unwrap();
        assert_eq!(secret.expose(), KEY);
    }

    #[test]
    fn test_serialize_hides_value() {
        let json = serde_json::to_string(&Secret::new(KEY.to_string())).unwrap();
        assert_eq!(json, "\"<redacted>\"");
    }

    #[test]
    fn test_is_blank() {
        assert!(Secret::new("   ".to_string()).is_blank());
        assert!(!Secret::new(KEY.to_string()).is_blank());
    }
}
