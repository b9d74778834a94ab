use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracer_client::{RateType, UploadResource};
use tracer_common::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "tracer")]
#[command(about = "Tracer CLI for actuarial calculation jobs", long_about = None)]
pub struct Args {
    /// Calculation API base URL
    #[arg(long, env = "TRACER_API_URL", default_value = "http://127.0.0.1:8000")]
    pub api_url: String,

    /// Pre-issued access token (Authorization: Bearer)
    #[arg(long, env = "TRACER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Identity provider authority used for silent token refresh
    #[arg(
        long,
        env = "TRACER_AUTHORITY",
        default_value = "https://login.microsoftonline.com/organizations"
    )]
    pub authority: String,

    /// Application (client) id registered with the identity provider
    #[arg(long, env = "TRACER_CLIENT_ID")]
    pub client_id: Option<String>,

    /// API scope; defaults to api://<client-id>/user_impersonation
    #[arg(long, env = "TRACER_SCOPE")]
    pub scope: Option<String>,

    /// Refresh token from an earlier interactive sign-in
    #[arg(long, env = "TRACER_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Account name the credentials belong to
    #[arg(long, env = "TRACER_ACCOUNT", default_value = "cli")]
    pub account: String,

    /// Job list refresh period in seconds
    #[arg(long, env = "TRACER_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Log output: text or json (stderr)
    #[arg(long, env = "TRACER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calculation jobs
    Jobs {
        #[command(subcommand)]
        subcommand: JobsCommand,
    },
    /// Queue a calculation job
    Submit {
        /// Product codes (repeatable or comma separated)
        #[arg(long = "product", value_delimiter = ',', required = true)]
        products: Vec<String>,

        /// Economic scenario set id
        #[arg(long)]
        scenario: Option<String>,

        /// Free-text assumption overrides
        #[arg(long)]
        assumptions: Option<String>,

        /// Run stochastic scenarios
        #[arg(long)]
        stochastic: bool,

        /// Run attribution analysis
        #[arg(long)]
        attribution: bool,

        /// Policy set ids (repeatable or comma separated)
        #[arg(long = "policy-set", value_delimiter = ',')]
        policy_sets: Vec<String>,

        /// Allow submitting without a scenario
        #[arg(long)]
        no_scenario: bool,

        /// Keep watching the job list until the new job finishes
        #[arg(long)]
        watch: bool,
    },
    /// Upload a policy or scenario file to storage
    Upload {
        /// policy-sets, scenario-sets, or an API path issuing upload URLs
        target: UploadResource,
        /// File to upload
        file: PathBuf,
    },
    /// Show the report of a finished job
    Report {
        /// Job ID
        job_id: String,
    },
    /// Reference data for the calculation form
    Catalog {
        #[command(subcommand)]
        subcommand: CatalogCommand,
    },
    /// Inspect and edit policy rows
    Policies {
        #[command(subcommand)]
        subcommand: PoliciesCommand,
    },
    /// Ingest policies or scenarios directly through the API
    Ingest {
        #[command(subcommand)]
        subcommand: IngestCommand,
    },
    /// Show the signed-in account
    Whoami,
}

#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List jobs and their status
    List,
    /// Poll job status until interrupted
    Watch {
        /// Follow a single job instead of the whole list
        #[arg(long)]
        job: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// Policy sets owned by the current user
    PolicySets,
    /// All policy sets with record counts and upload dates
    PolicySetDetails,
    /// Scenario sets owned by the current user
    Scenarios,
    /// Product codes present in the given policy sets
    ProductCodes {
        /// Policy set ids (repeatable or comma separated)
        #[arg(long = "set", value_delimiter = ',', required = true)]
        sets: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PoliciesCommand {
    /// List the rows of a policy set
    List {
        #[arg(long)]
        set: String,
    },
    /// Change one field of one row
    Update {
        #[arg(long)]
        set: String,
        /// Policy row id
        #[arg(long)]
        id: String,
        /// Column to change
        #[arg(long)]
        field: String,
        /// New value; parsed as JSON, otherwise taken as a string
        #[arg(long)]
        value: String,
    },
    /// Delete one row
    Delete {
        #[arg(long)]
        set: String,
        /// Policy row id
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum IngestCommand {
    /// Post a CSV file of policies
    Csv { file: PathBuf },
    /// Have the server pull a JSON policy file from a URL
    Url { url: String },
    /// Upload an economic scenario file
    ScenarioFile {
        file: PathBuf,
        /// monthly or yearly interest rates
        #[arg(long, default_value = "monthly")]
        rate: RateType,
    },
    /// Have the server pull scenario data from a JSON API endpoint
    ScenarioUrl {
        url: String,
        /// monthly or yearly interest rates
        #[arg(long, default_value = "monthly")]
        rate: RateType,
    },
}
