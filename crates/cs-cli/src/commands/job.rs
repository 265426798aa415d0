//! Job status command implementation.

use std::io::Write;

use cs_api::{Client, JobId, JobTracker, Transport};

use crate::error::CliError;
use crate::output::{JobReport, OutputFormat};

/// Handler for `queryAsyncJobResult`.
pub struct JobCommand<'a, T> {
    client: &'a Client<T>,
}

impl<'a, T: Transport> JobCommand<'a, T> {
    /// Creates a new job command handler.
    #[must_use]
    pub const fn new(client: &'a Client<T>) -> Self {
        Self { client }
    }

    /// Queries the job once and prints its status.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or output cannot be written.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        job_id: JobId,
    ) -> Result<(), CliError> {
        let status = JobTracker::new(self.client).query(&job_id).await?;
        format.write(out, &JobReport::new(job_id, status))
    }
}
