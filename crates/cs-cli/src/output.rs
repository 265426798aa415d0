//! Output formatting for CLI commands.
//!
//! `list*` results are always printed as indented JSON with sorted keys.
//! Job reports are human-readable text unless JSON output is selected.

use std::io::Write;

use cs_api::{DeployedVm, JobId, JobState, JobStatus};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both text and JSON output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a report in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TextDisplay,
    {
        match self.format {
            Format::Json => {
                let value = serde_json::to_value(value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                write_json(writer, &value)
            }
            Format::Text => value.write_text(writer),
        }
    }

    /// Write a report to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TextDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}

/// Trait for reports that have a human-readable form.
pub trait TextDisplay {
    /// Write the value as human-readable text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Writes `value` as two-space indented JSON with keys sorted at every level.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, value: &Value) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *writer, &sorted(value))
        .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
    writeln!(writer)?;
    Ok(())
}

// `Map` keeps insertion order when serde_json's `preserve_order` is enabled.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let map: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key.clone(), sorted(value)))
                .collect();
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// A completed deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    /// Job that performed the deployment.
    pub job_id: JobId,
    /// The deployed virtual machine.
    pub virtual_machine: DeployedVm,
}

impl TextDisplay for DeployReport {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let vm = &self.virtual_machine;
        write!(writer, "Virtual Machine {} deployed", vm.name)?;
        if let Some(ip) = &vm.ip_address {
            write!(writer, " with IP of {ip}")?;
        }
        if let Some(password) = &vm.password {
            write!(writer, " and password of {password}")?;
        }
        writeln!(writer, ".")?;
        Ok(())
    }
}

/// A job that was submitted and not waited for.
#[derive(Debug, Clone, Serialize)]
pub struct JobSubmitted {
    /// Remote command that created the job.
    pub command: String,
    /// The job identifier.
    pub job_id: JobId,
}

impl TextDisplay for JobSubmitted {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Job {} submitted to complete your request.", self.job_id)?;
        Ok(())
    }
}

/// The current status of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// The job identifier.
    pub job_id: JobId,
    /// Classified state.
    pub state: String,
    /// Raw status.
    pub status: JobStatus,
}

impl JobReport {
    /// Builds a report from a status query.
    #[must_use]
    pub fn new(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            state: status.state().to_string(),
            status,
        }
    }
}

impl TextDisplay for JobReport {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Job {}: {}.", self.job_id, self.state)?;
        match self.status.state() {
            JobState::Pending => {}
            JobState::Failed(_) => {
                if let Some(text) = self.status.error_text() {
                    writeln!(writer, "Error: {text}")?;
                }
            }
            JobState::Succeeded => {
                if let Some(result) = &self.status.jobresult {
                    write_json(writer, result)?;
                }
            }
        }
        Ok(())
    }
}
