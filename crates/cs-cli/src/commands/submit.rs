//! Fire-and-report command implementation.
//!
//! Used for async commands whose completion the user does not wait for,
//! such as `destroyVirtualMachine`.

use std::io::Write;

use cs_api::{Client, JobId, RequestParameters, Transport};
use tracing::info;

use crate::error::CliError;
use crate::output::{JobSubmitted, OutputFormat, write_json};

/// Handler for commands that submit an async job and report its id.
pub struct SubmitCommand<'a, T> {
    client: &'a Client<T>,
}

impl<'a, T: Transport> SubmitCommand<'a, T> {
    /// Creates a new submit command handler.
    #[must_use]
    pub const fn new(client: &'a Client<T>) -> Self {
        Self { client }
    }

    /// Executes `command` and reports the job it created.
    ///
    /// A result without a `jobid` is printed as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or output cannot be written.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &str,
        params: &RequestParameters,
    ) -> Result<(), CliError> {
        let result = self.client.dispatch(command, params).await?;
        match JobId::from_result(&result) {
            Some(job_id) => {
                info!(command, job_id = %job_id, "Job submitted");
                let report = JobSubmitted {
                    command: command.to_string(),
                    job_id,
                };
                format.write(out, &report)
            }
            None => write_json(out, &result),
        }
    }
}
