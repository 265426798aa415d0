//! Signed request dispatch.
//!
//! [`Client::dispatch`] performs one signed GET against the management API
//! and returns the normalized result.
//!
//! # Example
//!
//! ```rust,no_run
//! use cs_api::{Client, ConnectionParams, RequestParameters};
//!
//! # async fn example() -> cs_api::Result<()> {
//! let conn = ConnectionParams::new("api-key", "secret-key", "https://cloud.example.com/client/api")?;
//! let client = Client::new(conn)?;
//! let zones = client.dispatch("listZones", &RequestParameters::new()).await?;
//! println!("{zones}");
//! # Ok(())
//! # }
//! ```

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::credentials::{ConnectionParams, mask_key};
use crate::envelope::{Envelope, normalize};
use crate::error::{Error, Result};
use crate::params::RequestParameters;
use crate::signer::{CanonicalQuery, SignedQuery};
use crate::transport::{HttpTransport, Transport};

/// Dispatcher for signed API requests.
#[derive(Debug)]
pub struct Client<T = HttpTransport> {
    conn: ConnectionParams,
    transport: T,
}

impl Client<HttpTransport> {
    /// Creates a client using the default HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be built.
    pub fn new(conn: ConnectionParams) -> Result<Self> {
        Ok(Self::with_transport(conn, HttpTransport::new()?))
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client over a custom transport.
    #[must_use]
    pub fn with_transport(conn: ConnectionParams, transport: T) -> Self {
        Self { conn, transport }
    }

    /// The connection parameters requests are signed with.
    #[must_use]
    pub fn connection(&self) -> &ConnectionParams {
        &self.conn
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Signs the query for `command`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the secret key cannot be used for signing.
    pub fn sign(&self, command: &str, params: &RequestParameters) -> Result<SignedQuery> {
        CanonicalQuery::new(&self.conn, command, params).sign(self.conn.secret_key())
    }

    /// Builds the signed request URL for `command`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the secret key cannot be used for signing.
    pub fn request_url(&self, command: &str, params: &RequestParameters) -> Result<String> {
        Ok(self.sign(command, params)?.url(self.conn.api_url()))
    }

    /// Executes `command` and returns its normalized result.
    ///
    /// # Errors
    ///
    /// - `Error::Api` if the server returns an error envelope
    /// - `Error::Protocol` if the response envelope is unrecognized
    /// - `Error::Http` if the request itself fails
    pub async fn dispatch(&self, command: &str, params: &RequestParameters) -> Result<Value> {
        let signed = self.sign(command, params)?;

        debug!(
            command,
            apikey = %mask_key(self.conn.access_key()),
            params = params.len(),
            "Dispatching request"
        );
        trace!(
            endpoint = %self.conn.api_url(),
            query = signed.unsigned_query(),
            "Sending signed GET"
        );

        let reply = self.transport.get(&signed.url(self.conn.api_url())).await?;

        let envelope = match Envelope::decode(command, &reply.body) {
            Ok(envelope) => envelope,
            Err(Error::Protocol { reason }) if !reply.is_success() => {
                warn!(command, status = reply.status, "Undecodable error response");
                return Err(Error::http(Some(reply.status), reason));
            }
            Err(e) => return Err(e),
        };

        let payload = envelope.into_payload()?;
        Ok(normalize(command, payload))
    }
}
