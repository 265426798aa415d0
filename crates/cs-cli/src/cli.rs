//! Command-line argument parsing with clap.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cs_api::{ExplicitCredentials, ParamValue, PollPolicy, RequestParameters};

use crate::error::CliError;

/// Interact with Apache CloudStack.
#[derive(Parser, Debug, Clone)]
#[command(name = "cloudstack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// API access key. Requires --secret-key and --api-url.
    #[arg(long)]
    pub access_key: Option<String>,

    /// API secret key.
    #[arg(long)]
    pub secret_key: Option<String>,

    /// Management API endpoint, e.g. https://cloud.example.com/client/api.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Output format for command results.
    #[arg(long, value_enum, env = "CLOUDSTACK_FORMAT", default_value_t = Format::Text)]
    pub format: Format,

    /// Seconds to wait for an async job before giving up (0 waits forever).
    #[arg(long, env = "CLOUDSTACK_POLL_TIMEOUT", default_value_t = 1800)]
    pub poll_timeout: u64,

    /// Maximum number of job status queries.
    #[arg(long)]
    pub max_polls: Option<u32>,

    /// Enable debug logging on stderr.
    #[arg(long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Credentials given on the command line.
    #[must_use]
    pub fn explicit_credentials(&self) -> ExplicitCredentials {
        ExplicitCredentials {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            api_url: self.api_url.clone(),
        }
    }

    /// Poll policy derived from `--poll-timeout` and `--max-polls`.
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        let timeout = (self.poll_timeout > 0).then(|| Duration::from_secs(self.poll_timeout));
        PollPolicy::default()
            .with_timeout(timeout)
            .with_max_attempts(self.max_polls)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands, named after the remote commands they issue.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Deploy a Virtual Machine.
    #[command(name = "deployVirtualMachine")]
    DeployVirtualMachine(DeployArgs),

    /// Destroy a Virtual Machine.
    #[command(name = "destroyVirtualMachine")]
    DestroyVirtualMachine(DestroyArgs),

    /// List CloudStack Zones.
    #[command(name = "listZones")]
    ListZones,

    /// List CloudStack Templates.
    #[command(name = "listTemplates")]
    ListTemplates(ListTemplatesArgs),

    /// List CloudStack Service Offerings.
    #[command(name = "listServiceOfferings")]
    ListServiceOfferings,

    /// List Security Groups.
    #[command(name = "listSecurityGroups")]
    ListSecurityGroups,

    /// List Networks.
    #[command(name = "listNetworks")]
    ListNetworks(ListNetworksArgs),

    /// List Virtual Machines.
    #[command(name = "listVirtualMachines")]
    ListVirtualMachines(ListVirtualMachinesArgs),

    /// Show the status of an async job.
    #[command(name = "queryAsyncJobResult")]
    QueryAsyncJobResult(QueryJobArgs),
}

impl Commands {
    /// The remote command this subcommand issues.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeployVirtualMachine(_) => "deployVirtualMachine",
            Self::DestroyVirtualMachine(_) => "destroyVirtualMachine",
            Self::ListZones => "listZones",
            Self::ListTemplates(_) => "listTemplates",
            Self::ListServiceOfferings => "listServiceOfferings",
            Self::ListSecurityGroups => "listSecurityGroups",
            Self::ListNetworks(_) => "listNetworks",
            Self::ListVirtualMachines(_) => "listVirtualMachines",
            Self::QueryAsyncJobResult(_) => "queryAsyncJobResult",
        }
    }

    /// Request parameters for the remote command. Absent flags are omitted.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Usage` if a flag maps to an unusable parameter.
    pub fn to_parameters(&self) -> Result<RequestParameters, CliError> {
        let mut params = Params::default();
        match self {
            Self::DeployVirtualMachine(args) => {
                params.text("serviceofferingid", Some(&args.serviceofferingid))?;
                params.text("templateid", Some(&args.templateid))?;
                params.text("zoneid", Some(&args.zoneid))?;
                params.list("networkids", &args.networkids)?;
                params.list("securitygroupids", &args.securitygroupids)?;
                params.text("keypair", args.keypair.as_ref())?;
                params.text("userdata", args.userdata.as_ref())?;
                params.text("name", args.name.as_ref())?;
                params.text("displayname", args.displayname.as_ref())?;
            }
            Self::DestroyVirtualMachine(args) => {
                params.text("id", Some(&args.id))?;
            }
            Self::ListZones | Self::ListServiceOfferings | Self::ListSecurityGroups => {}
            Self::ListTemplates(args) => {
                params.text("templatefilter", Some(&args.templatefilter))?;
                params.text("hypervisor", args.hypervisor.as_ref())?;
                params.flag("listall", args.listall)?;
                params.text("zoneid", args.zoneid.as_ref())?;
            }
            Self::ListNetworks(args) => {
                params.text("zoneid", args.zoneid.as_ref())?;
                params.text("vpcid", args.vpcid.as_ref())?;
            }
            Self::ListVirtualMachines(args) => {
                params.text("zoneid", args.zoneid.as_ref())?;
                params.text("state", args.state.as_ref())?;
                params.text("tags", args.tags.as_ref())?;
                params.text("hypervisor", args.hypervisor.as_ref())?;
                params.text("networkid", args.networkid.as_ref())?;
            }
            Self::QueryAsyncJobResult(args) => {
                params.text("jobid", Some(&args.jobid))?;
            }
        }
        Ok(params.0)
    }

    /// Whether `--no-wait` was given.
    #[must_use]
    pub fn no_wait(&self) -> bool {
        matches!(self, Self::DeployVirtualMachine(args) if args.no_wait)
    }
}

#[derive(Default)]
struct Params(RequestParameters);

impl Params {
    fn text(&mut self, key: &str, value: Option<&String>) -> Result<(), CliError> {
        self.set(key, value.map(|v| ParamValue::Text(v.clone())))
    }

    fn list(&mut self, key: &str, values: &[String]) -> Result<(), CliError> {
        let values: Vec<String> = values.iter().filter(|v| !v.is_empty()).cloned().collect();
        self.set(key, (!values.is_empty()).then_some(ParamValue::List(values)))
    }

    fn flag(&mut self, key: &str, set: bool) -> Result<(), CliError> {
        self.set(key, set.then_some(ParamValue::Flag(true)))
    }

    fn set(&mut self, key: &str, value: Option<ParamValue>) -> Result<(), CliError> {
        self.0
            .insert_opt(key, value)
            .map_err(|e| CliError::usage(e.to_string()))
    }
}

/// Arguments for deployVirtualMachine.
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// The Service Offering ID to use for the VM.
    #[arg(short = 's', long)]
    pub serviceofferingid: String,

    /// The Template ID to use for the VM.
    #[arg(short = 't', long)]
    pub templateid: String,

    /// The zone ID to use for the VM.
    #[arg(short = 'z', long)]
    pub zoneid: String,

    /// The Network ID(s) for the VM (comma-separated).
    #[arg(short = 'n', long, value_delimiter = ',')]
    pub networkids: Vec<String>,

    /// The Security Group ID(s) for the VM (comma-separated).
    #[arg(short = 'g', long, value_delimiter = ',')]
    pub securitygroupids: Vec<String>,

    /// The SSH Keypair Name to inject in the VM.
    #[arg(short = 'k', long)]
    pub keypair: Option<String>,

    /// The User Data to inject in the VM.
    #[arg(short = 'u', long)]
    pub userdata: Option<String>,

    /// The Instance Name for the VM. Must be unique per zone.
    #[arg(long)]
    pub name: Option<String>,

    /// The Display Name for the VM.
    #[arg(long)]
    pub displayname: Option<String>,

    /// Report the job id instead of waiting for the deployment.
    #[arg(long)]
    pub no_wait: bool,
}

/// Arguments for destroyVirtualMachine.
#[derive(Args, Debug, Clone)]
pub struct DestroyArgs {
    /// Instance ID to destroy.
    #[arg(short = 'i', long)]
    pub id: String,
}

/// Arguments for listTemplates.
#[derive(Args, Debug, Clone)]
pub struct ListTemplatesArgs {
    /// Template filter to apply.
    #[arg(short = 'f', long = "filter", default_value = "featured")]
    pub templatefilter: String,

    /// List only templates of a single hypervisor.
    #[arg(long)]
    pub hypervisor: Option<String>,

    /// List all templates you are authorized to see.
    #[arg(long)]
    pub listall: bool,

    /// List only templates in a single zone.
    #[arg(short = 'z', long)]
    pub zoneid: Option<String>,
}

/// Arguments for listNetworks.
#[derive(Args, Debug, Clone)]
pub struct ListNetworksArgs {
    /// List only networks in a single zone.
    #[arg(short = 'z', long)]
    pub zoneid: Option<String>,

    /// List only networks in a single VPC.
    #[arg(short = 'v', long)]
    pub vpcid: Option<String>,
}

/// Arguments for listVirtualMachines.
#[derive(Args, Debug, Clone)]
pub struct ListVirtualMachinesArgs {
    /// List only Virtual Machines in a specific zone.
    #[arg(short = 'z', long)]
    pub zoneid: Option<String>,

    /// List only Virtual Machines of a specific state.
    #[arg(short = 's', long)]
    pub state: Option<String>,

    /// List only Virtual Machines with a specific tag.
    #[arg(short = 't', long)]
    pub tags: Option<String>,

    /// List only Virtual Machines on a specific hypervisor.
    #[arg(short = 'p', long)]
    pub hypervisor: Option<String>,

    /// List only Virtual Machines in a specific network.
    #[arg(short = 'n', long)]
    pub networkid: Option<String>,
}

/// Arguments for queryAsyncJobResult.
#[derive(Args, Debug, Clone)]
pub struct QueryJobArgs {
    /// Job ID to query.
    #[arg(short = 'j', long)]
    pub jobid: String,
}
