//! CLI command implementations.
//!
//! Each submodule handles one [`CommandKind`]:
//! - [`list`] - `list*` queries printed as JSON
//! - [`deploy`] - VM deployment with job polling
//! - [`submit`] - async jobs reported by id
//! - [`job`] - single job status query

pub mod deploy;
pub mod job;
pub mod list;
pub mod submit;

use std::io::Write;

use cs_api::{CancellationToken, Client, JobId, ParamValue, PollPolicy, RequestParameters, Transport};

pub use deploy::DeployCommand;
pub use job::JobCommand;
pub use list::ListCommand;
pub use submit::SubmitCommand;

use crate::error::CliError;
use crate::output::OutputFormat;
use crate::registry::{CommandKind, CommandSpec};

/// Settings shared by every command of one invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Report format.
    pub format: OutputFormat,
    /// Poll policy for blocking commands.
    pub policy: PollPolicy,
    /// Aborts job polling.
    pub cancel: CancellationToken,
    /// Wait for async jobs that support it.
    pub wait: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            policy: PollPolicy::default(),
            cancel: CancellationToken::new(),
            wait: true,
        }
    }
}

/// Runs a validated command with the handler for its kind.
///
/// # Errors
///
/// Returns any error of the selected handler.
pub async fn execute<T, W, P>(
    client: &Client<T>,
    spec: &CommandSpec,
    params: &RequestParameters,
    options: &RunOptions,
    out: &mut W,
    progress: &mut P,
) -> Result<(), CliError>
where
    T: Transport,
    W: Write,
    P: Write,
{
    match spec.kind {
        CommandKind::List => ListCommand::new(client).execute(out, spec.name, params).await,
        CommandKind::AsyncBlocking => {
            DeployCommand::new(client)
                .with_policy(options.policy.clone())
                .with_cancellation(options.cancel.clone())
                .execute(out, progress, &options.format, spec.name, params, options.wait)
                .await
        }
        CommandKind::AsyncReport => {
            SubmitCommand::new(client)
                .execute(out, &options.format, spec.name, params)
                .await
        }
        CommandKind::JobQuery => {
            let job_id = params
                .get("jobid")
                .map(ParamValue::render)
                .map(JobId::new)
                .ok_or_else(|| {
                    CliError::usage(format!("{}: missing required parameter 'jobid'", spec.name))
                })?;
            JobCommand::new(client).execute(out, &options.format, job_id).await
        }
    }
}
