//! HTTP transport used by the dispatcher.
//!
//! The [`Transport`] trait is the seam between request signing and the
//! network; [`HttpTransport`] is the reqwest-backed implementation.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpReply {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single GET request.
pub trait Transport: Send + Sync {
    /// Issues `GET url` and returns the status and body.
    ///
    /// Non-2xx statuses are not errors at this level; the API reports its
    /// own errors in the body.
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpReply>> + Send;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a transport with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cloudstack-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(None, e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpReply> {
        // Errors carry the request URL, which includes the api key.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                Error::http(e.status().map(|s| s.as_u16()), describe(&e.without_url()))
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(Some(status), describe(&e.without_url())))?;

        trace!(status, bytes = body.len(), "Received response");
        Ok(HttpReply { status, body })
    }
}

/// Formats an error with its whole source chain, `outer: inner: root`.
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// In-memory transport replaying canned replies in order.
///
/// Every requested URL is recorded. Once the script is exhausted, further
/// requests fail with `Error::Http`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a `200 OK` reply with the given body.
    #[must_use]
    pub fn reply(self, body: impl Into<String>) -> Self {
        self.reply_with_status(200, body)
    }

    /// Queues a reply with an explicit status.
    #[must_use]
    pub fn reply_with_status(self, status: u16, body: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(HttpReply {
            status,
            body: body.into(),
        }));
        self
    }

    /// Queues a transport failure.
    #[must_use]
    pub fn fail(self, error: Error) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// URLs requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of requests issued so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of queued replies not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpReply> {
        self.requests.lock().push(url.to_string());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::http(None, "no scripted reply left")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new()
            .reply("first")
            .reply_with_status(431, "second");

        let a = transport.get("http://x/1").await.expect("first reply");
        let b = transport.get("http://x/2").await.expect("second reply");
        assert_eq!(a.body, "first");
        assert_eq!(b.status, 431);
        assert!(transport.get("http://x/3").await.is_err());
        assert_eq!(
            transport.requests(),
            vec!["http://x/1", "http://x/2", "http://x/3"]
        );
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn test_reply_success_range() {
        let reply = |status| HttpReply {
            status,
            body: String::new(),
        };
        assert!(reply(200).is_success());
        assert!(reply(204).is_success());
        assert!(!reply(301).is_success());
        assert!(!reply(431).is_success());
        assert!(!reply(530).is_success());
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new().is_ok());
        assert!(HttpTransport::with_timeout(Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let transport =
            HttpTransport::with_timeout(Duration::from_secs(2)).expect("should build");
        let err = transport
            .get("http://127.0.0.1:1/client/api?command=listZones")
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, Error::Http { .. }));
        assert!(!err.to_string().contains("command=listZones"));
        assert!(err.to_string().contains("error sending request: "));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("error sending request")]
    struct Outer(#[source] Middle);

    #[derive(Debug, thiserror::Error)]
    #[error("client error")]
    struct Middle(#[source] std::io::Error);

    #[test]
    fn test_describe_walks_source_chain() {
        let err = Outer(Middle(std::io::ErrorKind::TimedOut.into()));
        assert_eq!(
            describe(&err),
            format!(
                "error sending request: client error: {}",
                std::io::Error::from(std::io::ErrorKind::TimedOut)
            )
        );
    }
}
