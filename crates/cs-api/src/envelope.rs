//! Response envelope decoding and `list*` result normalization.
//!
//! Every API response is a JSON object with a single well-known key:
//!
//! ```text
//! {"listzonesresponse": {"count": 1, "zone": [ ... ]}}
//! {"errorresponse": {"errorcode": 401, "errortext": "unable to verify user credentials"}}
//! ```
//!
//! Some server versions also report failures inside the command envelope
//! (`{"listzonesresponse": {"errorcode": 431, "errortext": "..."}}`); those
//! decode as [`Envelope::Error`] too.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Top-level key of a detached error response.
pub const ERROR_RESPONSE_KEY: &str = "errorresponse";

/// `list<type>` with an optional plural `s`, matched on the lower-cased command.
static LIST_COMMAND_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^list(\w+?)s?$").unwrap_or_else(|_| unreachable!()));

/// A decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// The payload under `<command>response`.
    Success(Value),
    /// A server-reported error.
    Error {
        /// Server error code, if reported.
        code: Option<i64>,
        /// Server error text.
        text: String,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errorcode: Option<i64>,
    #[serde(default)]
    errortext: Option<String>,
}

impl Envelope {
    /// The envelope key for `command`: `lowercase(command) + "response"`.
    #[must_use]
    pub fn response_key(command: &str) -> String {
        format!("{}response", command.to_lowercase())
    }

    /// Decodes a response body for `command`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the body is not a JSON object or carries
    /// neither the command envelope nor an error envelope.
    pub fn decode(command: &str, body: &str) -> Result<Self> {
        let mut object: Map<String, Value> = serde_json::from_str(body)
            .map_err(|e| Error::protocol(format!("response is not a JSON object: {e}")))?;

        let key = Self::response_key(command);
        if let Some(payload) = object.remove(&key) {
            if let Some(err) = embedded_error(&payload) {
                return Ok(err);
            }
            return Ok(Self::Success(payload));
        }

        if let Some(error) = object.remove(ERROR_RESPONSE_KEY) {
            let body: ErrorBody = serde_json::from_value(error)
                .map_err(|e| Error::protocol(format!("malformed {ERROR_RESPONSE_KEY}: {e}")))?;
            let text = body.errortext.ok_or_else(|| {
                Error::protocol(format!("{ERROR_RESPONSE_KEY} without errortext"))
            })?;
            return Ok(Self::Error {
                code: body.errorcode,
                text,
            });
        }

        Err(Error::protocol(format!("unable to parse the response: no '{key}' key")))
    }

    /// Converts the envelope into a payload or an `Error::Api`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Api` for error envelopes.
    pub fn into_payload(self) -> Result<Value> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Error { code, text } => Err(Error::api(code, text)),
        }
    }
}

fn embedded_error(payload: &Value) -> Option<Envelope> {
    let object = payload.as_object()?;
    let code = object.get("errorcode")?.as_i64();
    let text = object.get("errortext")?.as_str()?;
    Some(Envelope::Error {
        code,
        text: text.to_string(),
    })
}

/// Candidate payload keys for a `list*` command, singular first.
///
/// `listVirtualMachines` yields `("virtualmachine", "virtualmachines")`.
/// Returns `None` for commands that are not `list*`.
#[must_use]
pub fn list_item_keys(command: &str) -> Option<(String, String)> {
    let lowered = command.to_lowercase();
    let captures = LIST_COMMAND_REGEX.captures(&lowered)?;
    let singular = captures.get(1)?.as_str().to_string();
    let plural = format!("{singular}s");
    Some((singular, plural))
}

/// Extracts the interesting part of a command's payload.
///
/// For `list*` commands this is the value under the derived item key
/// (singular, then plural). Anything else, including a `list*` payload
/// without either key, is returned unchanged.
#[must_use]
pub fn normalize(command: &str, payload: Value) -> Value {
    let Some((singular, plural)) = list_item_keys(command) else {
        return payload;
    };
    match payload {
        Value::Object(mut object) => {
            if let Some(items) = object.remove(&singular) {
                return items;
            }
            if let Some(items) = object.remove(&plural) {
                return items;
            }
            Value::Object(object)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("listZones", Some(("zone", "zones")) ; "simple plural")]
    #[test_case("listVirtualMachines", Some(("virtualmachine", "virtualmachines")) ; "camel case")]
    #[test_case("listAsyncJobs", Some(("asyncjob", "asyncjobs")) ; "plural kept by server")]
    #[test_case("listCapacity", Some(("capacity", "capacitys")) ; "no trailing s")]
    #[test_case("deployVirtualMachine", None ; "not a list command")]
    #[test_case("queryAsyncJobResult", None ; "job query")]
    #[test_case("list", None ; "bare list")]
    fn test_list_item_keys(command: &str, expected: Option<(&str, &str)>) {
        let expected = expected.map(|(s, p)| (s.to_string(), p.to_string()));
        assert_eq!(list_item_keys(command), expected);
    }

    #[test]
    fn test_response_key() {
        assert_eq!(Envelope::response_key("listZones"), "listzonesresponse");
        assert_eq!(
            Envelope::response_key("queryAsyncJobResult"),
            "queryasyncjobresultresponse"
        );
    }

    #[test]
    fn test_normalize_singular_key() {
        let payload = json!({"count": 1, "zone": [{"id": "z1"}]});
        assert_eq!(normalize("listZones", payload), json!([{"id": "z1"}]));
    }

    #[test]
    fn test_normalize_plural_fallback() {
        let payload = json!({"count": 1, "zones": [{"id": "z1"}]});
        assert_eq!(normalize("listZones", payload), json!([{"id": "z1"}]));
    }

    #[test]
    fn test_normalize_prefers_singular() {
        let payload = json!({"zone": ["singular"], "zones": ["plural"]});
        assert_eq!(normalize("listZones", payload), json!(["singular"]));
    }

    #[test]
    fn test_normalize_neither_key_returns_payload() {
        let payload = json!({"count": 0});
        assert_eq!(normalize("listZones", payload.clone()), payload);

        let empty = json!({});
        assert_eq!(normalize("listZones", empty.clone()), empty);
    }

    #[test]
    fn test_normalize_non_list_command_unchanged() {
        let payload = json!({"id": "vm-1", "jobid": "job-1"});
        assert_eq!(normalize("deployVirtualMachine", payload.clone()), payload);
    }

    #[test]
    fn test_decode_success() {
        let body = r#"{"listzonesresponse": {"count": 1, "zone": [{"id": "z1"}]}}"#;
        let envelope = Envelope::decode("listZones", body).expect("should decode");
        assert_eq!(
            envelope,
            Envelope::Success(json!({"count": 1, "zone": [{"id": "z1"}]}))
        );
    }

    #[test]
    fn test_decode_error_response() {
        let body = r#"{"errorresponse": {"errortext": "bad key"}}"#;
        let envelope = Envelope::decode("listZones", body).expect("should decode");
        assert_eq!(
            envelope,
            Envelope::Error {
                code: None,
                text: "bad key".into()
            }
        );
        let err = envelope.into_payload().expect_err("should be api error");
        assert!(matches!(err, Error::Api { ref text, .. } if text == "bad key"));
    }

    #[test]
    fn test_decode_embedded_error() {
        let body = r#"{"deployvirtualmachineresponse": {"uuidList": [], "errorcode": 431, "errortext": "Unable to find template"}}"#;
        let envelope = Envelope::decode("deployVirtualMachine", body).expect("should decode");
        assert_eq!(
            envelope,
            Envelope::Error {
                code: Some(431),
                text: "Unable to find template".into()
            }
        );
    }

    #[test]
    fn test_decode_unknown_envelope_is_protocol_error() {
        let body = r#"{"somethingelse": {}}"#;
        let err = Envelope::decode("listZones", body).expect_err("should fail");
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_non_object_is_protocol_error() {
        for body in ["[]", "not json", "\"text\""] {
            let err = Envelope::decode("listZones", body).expect_err("should fail");
            assert!(matches!(err, Error::Protocol { .. }), "body: {body}");
        }
    }

    #[test]
    fn test_decode_error_response_without_text() {
        let body = r#"{"errorresponse": {"errorcode": 401}}"#;
        let err = Envelope::decode("listZones", body).expect_err("should fail");
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
