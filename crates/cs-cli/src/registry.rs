//! Subcommand registry.
//!
//! Every subcommand is declared once, with the remote command it issues,
//! the parameters it may send and how its result is handled. Validation
//! against this table happens before credentials are resolved, so a usage
//! error never costs a request.

use cs_api::RequestParameters;

use crate::cli::Commands;
use crate::error::CliError;

/// How a command's result is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Print the normalized result as JSON.
    List,
    /// Submit an async job and poll it to completion.
    AsyncBlocking,
    /// Submit an async job and report its id.
    AsyncReport,
    /// Query the status of an existing job.
    JobQuery,
}

/// A group of parameters of which at least one must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneOf {
    /// Candidate parameter names.
    pub keys: &'static [&'static str],
    /// Usage message when none is present.
    pub message: &'static str,
}

/// Declaration of one subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Remote command name, also the subcommand name.
    pub name: &'static str,
    /// Result handling.
    pub kind: CommandKind,
    /// Parameters that must be present.
    pub required: &'static [&'static str],
    /// Parameters that may be present.
    pub optional: &'static [&'static str],
    /// At-least-one-of constraint.
    pub one_of: Option<OneOf>,
}

/// All supported subcommands.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "deployVirtualMachine",
        kind: CommandKind::AsyncBlocking,
        required: &["serviceofferingid", "templateid", "zoneid"],
        optional: &["networkids", "securitygroupids", "keypair", "userdata", "name", "displayname"],
        one_of: Some(OneOf {
            keys: &["networkids", "securitygroupids"],
            message: "Either a Network or Security Group ID is required.",
        }),
    },
    CommandSpec {
        name: "destroyVirtualMachine",
        kind: CommandKind::AsyncReport,
        required: &["id"],
        optional: &[],
        one_of: None,
    },
    CommandSpec {
        name: "listZones",
        kind: CommandKind::List,
        required: &[],
        optional: &[],
        one_of: None,
    },
    CommandSpec {
        name: "listTemplates",
        kind: CommandKind::List,
        required: &["templatefilter"],
        optional: &["hypervisor", "listall", "zoneid"],
        one_of: None,
    },
    CommandSpec {
        name: "listServiceOfferings",
        kind: CommandKind::List,
        required: &[],
        optional: &[],
        one_of: None,
    },
    CommandSpec {
        name: "listSecurityGroups",
        kind: CommandKind::List,
        required: &[],
        optional: &[],
        one_of: None,
    },
    CommandSpec {
        name: "listNetworks",
        kind: CommandKind::List,
        required: &[],
        optional: &["zoneid", "vpcid"],
        one_of: None,
    },
    CommandSpec {
        name: "listVirtualMachines",
        kind: CommandKind::List,
        required: &[],
        optional: &["zoneid", "state", "tags", "hypervisor", "networkid"],
        one_of: None,
    },
    CommandSpec {
        name: "queryAsyncJobResult",
        kind: CommandKind::JobQuery,
        required: &["jobid"],
        optional: &[],
        one_of: None,
    },
];

/// Finds the declaration for a subcommand.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

impl CommandSpec {
    /// Checks `params` against this declaration.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Usage` for a missing required parameter, an
    /// unsatisfied one-of group, or an undeclared parameter.
    pub fn validate(&self, params: &RequestParameters) -> Result<(), CliError> {
        if let Some(missing) = self.required.iter().find(|key| !params.contains(key)) {
            return Err(CliError::usage(format!(
                "{}: missing required parameter '{missing}'",
                self.name
            )));
        }

        if let Some(group) = &self.one_of {
            if !group.keys.iter().any(|key| params.contains(key)) {
                return Err(CliError::usage(group.message));
            }
        }

        if let Some(unknown) = params.keys().find(|key| !self.accepts(key)) {
            return Err(CliError::usage(format!(
                "{}: unsupported parameter '{unknown}'",
                self.name
            )));
        }

        Ok(())
    }

    fn accepts(&self, key: &str) -> bool {
        self.required.contains(&key)
            || self.optional.contains(&key)
            || self.one_of.is_some_and(|group| group.keys.contains(&key))
    }
}

/// Resolves a parsed subcommand to its declaration and validated parameters.
///
/// # Errors
///
/// Returns `CliError::Usage` if the subcommand is not registered or its
/// parameters fail validation.
pub fn prepare(command: &Commands) -> Result<(&'static CommandSpec, RequestParameters), CliError> {
    let spec = lookup(command.name())
        .ok_or_else(|| CliError::usage(format!("unknown command '{}'", command.name())))?;
    let params = command.to_parameters()?;
    spec.validate(&params)?;
    Ok((spec, params))
}
