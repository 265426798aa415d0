//! Canonical query construction and request signing.
//!
//! The server re-derives the signature from the decoded query, so the client
//! has to reproduce its canonicalization exactly:
//!
//! 1. `apikey`, `command` and `response=json` are added to the parameters
//! 2. keys are sorted byte-wise
//! 3. each value is percent-encoded, with space as `%20` (never `+`)
//! 4. the joined string is lower-cased and signed with HMAC-SHA1
//!
//! Two encodings of the same pairs are produced. The *hash string* keeps
//! commas escaped as `%2C` and is only used for signing; the *wire string*
//! puts literal commas back and is what actually goes over HTTP.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;

use crate::credentials::ConnectionParams;
use crate::error::{Error, Result};
use crate::params::RequestParameters;

type HmacSha1 = Hmac<Sha1>;

/// Characters left unescaped in query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

/// Response format requested from the server.
pub const RESPONSE_FORMAT: &str = "json";

/// Percent-encodes a query value. Space becomes `%20`, hex is uppercase.
#[must_use]
pub fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Computes `base64(HMAC-SHA1(secret, lowercase(hash_string)))`.
///
/// # Errors
///
/// Returns `Error::Config` if the secret cannot be used as an HMAC key.
pub fn compute_signature(secret_key: &str, hash_string: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .map_err(|e| Error::config(format!("unusable secret key: {e}")))?;
    mac.update(hash_string.to_ascii_lowercase().as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Sorted, rendered (but not yet encoded) parameter pairs for one request,
/// including the injected `apikey`, `command` and `response` keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalQuery {
    pairs: Vec<(String, String)>,
}

impl CanonicalQuery {
    /// Builds the canonical pair list for `command` with `params`.
    #[must_use]
    pub fn new(conn: &ConnectionParams, command: &str, params: &RequestParameters) -> Self {
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.render()))
            .collect();
        pairs.push(("apikey".to_string(), conn.access_key().to_string()));
        pairs.push(("command".to_string(), command.to_string()));
        pairs.push(("response".to_string(), RESPONSE_FORMAT.to_string()));
        pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        Self { pairs }
    }

    /// The sorted pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Fully percent-encoded `key=value&...` string used for signing.
    #[must_use]
    pub fn hash_string(&self) -> String {
        self.join(encode_value)
    }

    /// Request string: as [`hash_string`](Self::hash_string) but with literal
    /// commas.
    #[must_use]
    pub fn wire_string(&self) -> String {
        self.join(|value| encode_value(value).replace("%2C", ","))
    }

    /// Signs the query with the connection's secret key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the secret key is unusable.
    pub fn sign(&self, secret_key: &str) -> Result<SignedQuery> {
        let signature = compute_signature(secret_key, &self.hash_string())?;
        Ok(SignedQuery {
            wire: self.wire_string(),
            signature,
        })
    }

    fn join<F: Fn(&str) -> String>(&self, encode: F) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A wire query plus its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQuery {
    wire: String,
    signature: String,
}

impl SignedQuery {
    /// The base64 signature, unencoded.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The wire string without the signature.
    #[must_use]
    pub fn unsigned_query(&self) -> &str {
        &self.wire
    }

    /// The full query string, `...&signature=<encoded signature>`.
    #[must_use]
    pub fn query_string(&self) -> String {
        format!("{}&signature={}", self.wire, encode_value(&self.signature))
    }

    /// The request URL for the given endpoint.
    #[must_use]
    pub fn url(&self, api_url: &str) -> String {
        format!("{api_url}?{}", self.query_string())
    }
}
