//! Request parameters for a single remote command.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Keys injected by the dispatcher; callers may not set them.
pub const RESERVED_KEYS: &[&str] = &["apikey", "command", "response", "signature"];

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Plain string.
    Text(String),
    /// Boolean flag, rendered as `true` / `false`.
    Flag(bool),
    /// List of values, rendered comma-joined.
    List(Vec<String>),
}

impl ParamValue {
    /// Renders the value as it is sent to the server, before encoding.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Flag(b) => b.to_string(),
            Self::List(items) => items.join(","),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Parameters for one remote command, keyed by case-sensitive name.
///
/// Iteration is in byte-wise lexicographic key order, which is the canonical
/// order used for signing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParameters {
    entries: BTreeMap<String, ParamValue>,
}

impl RequestParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` for reserved or empty keys.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::invalid_parameter(key, "parameter name is empty"));
        }
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(Error::invalid_parameter(
                key,
                "reserved parameter is set by the dispatcher",
            ));
        }
        self.entries.insert(key, value.into());
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` for reserved or empty keys.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Result<Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Sets a parameter only if a value is present.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` for reserved or empty keys.
    pub fn insert_opt<V: Into<ParamValue>>(
        &mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Result<()> {
        match value {
            Some(value) => self.insert(key, value),
            None => Ok(()),
        }
    }

    /// Looks up a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// Returns `true` if the parameter is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates parameters in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameter names in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_render_values() {
        assert_eq!(ParamValue::from("abc").render(), "abc");
        assert_eq!(ParamValue::from(true).render(), "true");
        assert_eq!(ParamValue::from(false).render(), "false");
        assert_eq!(
            ParamValue::from(vec!["a".to_string(), "b".to_string()]).render(),
            "a,b"
        );
    }

    #[test_case("apikey" ; "api key")]
    #[test_case("command" ; "command")]
    #[test_case("response" ; "response format")]
    #[test_case("signature" ; "signature")]
    fn test_reserved_keys_rejected(key: &str) {
        let mut params = RequestParameters::new();
        let err = params.insert(key, "x").expect_err("reserved key should fail");
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(params.is_empty());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let params = RequestParameters::new()
            .with("Command", "x")
            .and_then(|p| p.with("zoneid", "z"))
            .and_then(|p| p.with("zoneId", "Z"))
            .expect("should accept");
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("zoneid"), Some(&ParamValue::from("z")));
        assert_eq!(params.get("zoneId"), Some(&ParamValue::from("Z")));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(RequestParameters::new().with("", "x").is_err());
    }

    #[test]
    fn test_iteration_is_bytewise_sorted() {
        let params = RequestParameters::new()
            .with("zoneid", "1")
            .and_then(|p| p.with("Zebra", "2"))
            .and_then(|p| p.with("account", "3"))
            .and_then(|p| p.with("_x", "4"))
            .expect("should accept");
        let keys: Vec<&str> = params.keys().collect();
        assert_eq!(keys, vec!["Zebra", "_x", "account", "zoneid"]);
    }

    #[test]
    fn test_insert_opt_skips_none() {
        let mut params = RequestParameters::new();
        params.insert_opt("keypair", None::<String>).expect("should accept");
        params.insert_opt("name", Some("vm1")).expect("should accept");
        assert!(!params.contains("keypair"));
        assert!(params.contains("name"));
    }

    #[test]
    fn test_insert_replaces() {
        let mut params = RequestParameters::new();
        params.insert("listall", false).expect("should accept");
        params.insert("listall", true).expect("should accept");
        assert_eq!(params.get("listall"), Some(&ParamValue::Flag(true)));
    }
}
