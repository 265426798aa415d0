//! # cs-api
//!
//! Signed request dispatch and async job tracking for the CloudStack
//! management API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  dispatch   ┌──────────┐  signed GET  ┌────────────────┐
//! │   JobTracker     │────────────►│  Client  │─────────────►│ management API │
//! │ (queryAsyncJob…) │◄────────────│          │◄─────────────│                │
//! └──────────────────┘   Result    └──────────┘   envelope   └────────────────┘
//! ```
//!
//! - [`credentials`] resolves a [`ConnectionParams`] once per invocation
//! - [`signer`] builds the canonical query and its HMAC-SHA1 signature
//! - [`client`] sends it and decodes the [`envelope`]
//! - [`job`] polls long-running operations to completion

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod job;
pub mod params;
pub mod signer;
pub mod transport;

pub use client::Client;
pub use credentials::{ConnectionParams, CredentialResolver, CredentialSource, ExplicitCredentials};
pub use envelope::{Envelope, normalize};
pub use error::{Error, Result};
pub use job::{Backoff, DeployedVm, JobId, JobOutcome, JobState, JobStatus, JobTracker, PollPolicy};
pub use params::{ParamValue, RequestParameters};
pub use signer::{CanonicalQuery, SignedQuery};
pub use transport::{HttpReply, HttpTransport, ScriptedTransport, Transport};

/// Re-exported so callers can cancel polling without a direct dependency.
pub use tokio_util::sync::CancellationToken;

