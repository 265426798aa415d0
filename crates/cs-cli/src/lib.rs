//! # cs-cli
//!
//! Command-line interface for the CloudStack management API.
//!
//! # Architecture
//!
//! ```text
//! argv ──► cli::Cli ──► registry::prepare ──► connect ──► commands::execute
//!                        (usage errors)       (credentials)  (dispatch / poll)
//! ```
//!
//! Parameters are validated against the [`registry`] before credentials are
//! resolved, so a usage error never reaches the network.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod registry;

use std::io::Write;

use cs_api::{CancellationToken, Client, CredentialResolver, HttpTransport, Transport};
use tracing::debug;

pub use cli::{Cli, Commands, Format};
pub use commands::RunOptions;
pub use error::CliError;
pub use output::OutputFormat;

/// Resolves credentials for `cli` and builds an HTTP client.
///
/// # Errors
///
/// Returns `CliError::Api` with a configuration error if no usable
/// credentials are found.
pub fn connect(cli: &Cli) -> Result<Client<HttpTransport>, CliError> {
    let conn = CredentialResolver::new(cli.explicit_credentials()).resolve()?;
    debug!(api_url = %conn.api_url(), "Connection parameters resolved");
    Ok(Client::new(conn)?)
}

/// Runs one invocation.
///
/// `connect` is only called once the command line has been validated.
/// Cancelling `cancel` aborts the command, including an in-flight request.
///
/// # Errors
///
/// Returns `CliError::Usage` for invalid command lines,
/// `CliError::Interrupted` when cancelled mid-request, and any error of the
/// executed command.
pub async fn run<T, F, W, P>(
    cli: &Cli,
    connect: F,
    cancel: CancellationToken,
    out: &mut W,
    progress: &mut P,
) -> Result<(), CliError>
where
    T: Transport,
    F: FnOnce(&Cli) -> Result<Client<T>, CliError>,
    W: Write,
    P: Write,
{
    let (spec, params) = registry::prepare(&cli.command)?;
    let client = connect(cli)?;

    let options = RunOptions {
        format: OutputFormat::new(cli.format),
        policy: cli.poll_policy(),
        cancel: cancel.clone(),
        wait: !cli.command.no_wait(),
    };

    // Polled first so a cancelled poll loop can still report its job id.
    tokio::select! {
        biased;
        result = commands::execute(&client, spec, &params, &options, out, progress) => result,
        () = cancel.cancelled() => {
            debug!(command = spec.name, "Interrupted");
            Err(CliError::Interrupted)
        }
    }
}
