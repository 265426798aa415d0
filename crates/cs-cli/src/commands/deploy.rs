//! Deploy command implementation.
//!
//! Submits `deployVirtualMachine` and, unless told not to wait, polls the
//! job until the virtual machine is running. A dot is written to the
//! progress stream for every pending status.

use std::io::Write;

use cs_api::{
    CancellationToken, Client, DeployedVm, Error, JobId, JobTracker, PollPolicy,
    RequestParameters, Transport,
};
use tracing::info;

use crate::error::CliError;
use crate::output::{DeployReport, JobSubmitted, OutputFormat};

/// Handler for the deploy command.
pub struct DeployCommand<'a, T> {
    client: &'a Client<T>,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl<'a, T: Transport> DeployCommand<'a, T> {
    /// Creates a new deploy command handler with the default poll policy.
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

    /// Executes the deploy command.
    ///
    /// # Errors
    ///
    /// Returns error if submission fails, the job fails or times out, or
    /// output cannot be written.
    pub async fn execute<W: Write, P: Write>(
        &self,
        out: &mut W,
        progress: &mut P,
        format: &OutputFormat,
        command: &str,
        params: &RequestParameters,
        wait: bool,
    ) -> Result<(), CliError> {
        let submitted = self.client.dispatch(command, params).await?;
        let job_id = JobId::from_result(&submitted)
            .ok_or_else(|| Error::protocol(format!("{command} returned no jobid")))?;
        info!(command, job_id = %job_id, "Job submitted");

        if !wait {
            let report = JobSubmitted {
                command: command.to_string(),
                job_id,
            };
            return format.write(out, &report);
        }

        let tracker = JobTracker::new(self.client)
            .with_policy(self.policy.clone())
            .with_cancellation(self.cancel.clone());

        let mut pending = 0u32;
        let outcome = tracker
            .await_completion(&job_id, |_| {
                pending += 1;
                write!(progress, ".").ok();
                progress.flush().ok();
            })
            .await;
        if pending > 0 {
            writeln!(progress).ok();
        }
        let outcome = outcome?;

        let result = outcome
            .result()
            .ok_or_else(|| Error::protocol(format!("job {job_id} succeeded without a result")))?;
        let report = DeployReport {
            virtual_machine: DeployedVm::from_job_result(result)?,
            job_id,
        };
        format.write(out, &report)
    }
}
