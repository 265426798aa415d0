//! Async job tracking.
//!
//! Mutating commands return a `jobid`. The [`JobTracker`] polls
//! `queryAsyncJobResult` until the job leaves the pending state:
//!
//! ```text
//!   PENDING (0) ──► SUCCEEDED (1)
//!        │
//!        └────────► FAILED (anything else)
//! ```
//!
//! Polling is bounded by a [`PollPolicy`] and can be aborted with a
//! [`CancellationToken`]. Giving up does not touch the remote job; its id is
//! reported so it can be queried later.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::params::RequestParameters;
use crate::transport::Transport;

/// Remote command used to query job status.
pub const QUERY_JOB_COMMAND: &str = "queryAsyncJobResult";

/// Identifier of a server-side async job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps a job identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the `jobid` field from a command result, if present.
    #[must_use]
    pub fn from_result(result: &Value) -> Option<Self> {
        result.get("jobid").and_then(Value::as_str).map(Self::new)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classified job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Status 0.
    Pending,
    /// Status 1.
    Succeeded,
    /// Any other status.
    Failed(i64),
}

impl JobState {
    /// Classifies a raw `jobstatus` value.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Pending,
            1 => Self::Succeeded,
            other => Self::Failed(other),
        }
    }

    /// Returns `true` for succeeded and failed jobs.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(code) => write!(f, "failed ({code})"),
        }
    }
}

/// The result of one `queryAsyncJobResult` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Job identifier, echoed by the server.
    #[serde(default)]
    pub jobid: Option<String>,
    /// Raw status code (0 pending, 1 success, 2 failure).
    pub jobstatus: i64,
    /// Result code reported with the status.
    #[serde(default)]
    pub jobresultcode: Option<i64>,
    /// Result type (`object`, `text`, ...).
    #[serde(default)]
    pub jobresulttype: Option<String>,
    /// Result payload, present once the job is terminal.
    #[serde(default)]
    pub jobresult: Option<Value>,
    /// Server-side command class that created the job.
    #[serde(default)]
    pub cmd: Option<String>,
}

impl JobStatus {
    /// Decodes a status from a dispatch result.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the value has no numeric `jobstatus`.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::protocol(format!("malformed job status: {e}")))
    }

    /// The classified state.
    #[must_use]
    pub fn state(&self) -> JobState {
        JobState::from_code(self.jobstatus)
    }

    /// `jobresult.errortext` of a failed job.
    #[must_use]
    pub fn error_text(&self) -> Option<String> {
        self.jobresult
            .as_ref()?
            .get("errortext")?
            .as_str()
            .map(str::to_string)
    }
}

/// Delay between status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Constant delay.
    Fixed(Duration),
    /// Uniformly random delay in `[min, max]`.
    Jitter {
        /// Lower bound.
        min: Duration,
        /// Upper bound.
        max: Duration,
    },
    /// Doubling delay starting at `initial`, capped at `max`.
    Exponential {
        /// First delay.
        initial: Duration,
        /// Cap.
        max: Duration,
    },
}

impl Backoff {
    /// Delay before the query following the `attempt`-th pending status
    /// (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Jitter { min, max } => {
                if min >= max {
                    min
                } else {
                    rand::thread_rng().gen_range(min..=max)
                }
            }
            Self::Exponential { initial, max } => {
                let factor = 2u32.checked_pow(attempt.min(31)).unwrap_or(u32::MAX);
                initial.checked_mul(factor).map_or(max, |d| d.min(max))
            }
        }
    }
}

/// Bounds on how long a job is polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between queries.
    pub backoff: Backoff,
    /// Maximum number of status queries, including the first.
    pub max_attempts: Option<u32>,
    /// Maximum total wait.
    pub timeout: Option<Duration>,
}

/// Default lower bound of the poll delay.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(2);

/// Default upper bound of the poll delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Default total wait before giving up.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Jitter {
                min: DEFAULT_MIN_DELAY,
                max: DEFAULT_MAX_DELAY,
            },
            max_attempts: None,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

impl PollPolicy {
    /// A policy that polls until the job is terminal.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }

    /// Sets the backoff.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the attempt cap.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the total wait.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A job that reached the succeeded state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    /// The job identifier.
    pub job_id: JobId,
    /// The final status.
    pub status: JobStatus,
    /// Number of status queries issued.
    pub attempts: u32,
}

impl JobOutcome {
    /// The job result payload.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.status.jobresult.as_ref()
    }
}

/// Polls job status through a [`Client`].
#[derive(Debug)]
pub struct JobTracker<'a, T> {
    client: &'a Client<T>,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl<'a, T: Transport> JobTracker<'a, T> {
    /// Creates a tracker with the default policy.
    #[must_use]
    pub fn new(client: &'a Client<T>) -> Self {
        Self {
            client,
            policy: PollPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the poll policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the token that aborts polling.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Queries the current status of a job once.
    ///
    /// # Errors
    ///
    /// Propagates dispatch errors; `Error::Protocol` if the status is
    /// malformed.
    pub async fn query(&self, job_id: &JobId) -> Result<JobStatus> {
        let mut params = RequestParameters::new();
        params.insert("jobid", job_id.as_str())?;
        let value = self.client.dispatch(QUERY_JOB_COMMAND, &params).await?;
        JobStatus::from_value(value)
    }

    /// Polls until the job succeeds, fails, or the policy gives up.
    ///
    /// `on_pending` is called after every pending status.
    ///
    /// # Errors
    ///
    /// - `Error::JobFailed` if the job ends in a non-success state
    /// - `Error::PollTimeout` if the policy's bound is reached
    /// - `Error::Cancelled` if the token is cancelled
    /// - any dispatch error from a status query, unretried
    pub async fn await_completion<F>(&self, job_id: &JobId, mut on_pending: F) -> Result<JobOutcome>
    where
        F: FnMut(&JobStatus),
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    job_id: job_id.to_string(),
                });
            }

            let status = tokio::select! {
                () = self.cancel.cancelled() => {
                    return Err(Error::Cancelled { job_id: job_id.to_string() });
                }
                status = self.query(job_id) => status?,
            };
            attempts += 1;

            match status.state() {
                JobState::Succeeded => {
                    info!(job_id = %job_id, attempts, "Job succeeded");
                    return Ok(JobOutcome {
                        job_id: job_id.clone(),
                        status,
                        attempts,
                    });
                }
                JobState::Failed(code) => {
                    info!(job_id = %job_id, status = code, "Job failed");
                    return Err(Error::JobFailed {
                        job_id: job_id.to_string(),
                        status: code,
                        text: status.error_text(),
                    });
                }
                JobState::Pending => on_pending(&status),
            }

            if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(Error::PollTimeout {
                    job_id: job_id.to_string(),
                    attempts,
                });
            }

            let delay = self.policy.backoff.delay(attempts - 1);
            if self
                .policy
                .timeout
                .is_some_and(|timeout| started.elapsed() + delay > timeout)
            {
                return Err(Error::PollTimeout {
                    job_id: job_id.to_string(),
                    attempts,
                });
            }

            debug!(job_id = %job_id, attempts, delay_ms = delay.as_millis() as u64, "Job pending");
            tokio::select! {
                () = self.cancel.cancelled() => {
                    return Err(Error::Cancelled { job_id: job_id.to_string() });
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Fields of interest from a successful `deployVirtualMachine` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedVm {
    /// Virtual machine id.
    pub id: Option<String>,
    /// Instance name.
    pub name: String,
    /// Display name.
    pub display_name: Option<String>,
    /// IP address of the first NIC.
    pub ip_address: Option<String>,
    /// Generated password, when the template has passwords enabled.
    pub password: Option<String>,
}

impl DeployedVm {
    /// Extracts the deployed VM from a job result
    /// (`{"virtualmachine": {...}}`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if there is no `virtualmachine` object or it
    /// has no name.
    pub fn from_job_result(result: &Value) -> Result<Self> {
        let vm = result
            .get("virtualmachine")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::protocol("job result has no virtualmachine"))?;

        let text = |key: &str| vm.get(key).and_then(Value::as_str).map(str::to_string);

        let name = text("name").ok_or_else(|| Error::protocol("virtualmachine has no name"))?;
        let ip_address = vm
            .get("nic")
            .and_then(Value::as_array)
            .and_then(|nics| nics.first())
            .and_then(|nic| nic.get("ipaddress"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let password_enabled = vm
            .get("passwordenabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            id: text("id"),
            name,
            display_name: text("displayname"),
            ip_address,
            password: if password_enabled { text("password") } else { None },
        })
    }
}
