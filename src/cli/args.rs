//! Command line argument parsing and validation.

use crate::config::OperationConfig;
use crate::restore::{DEFAULT_BASE_PREFIX, DEFAULT_DATE_FORMAT, RestoreTier};
use crate::state::default_state_dir;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Deploy and tear down CloudFormation stacks, and track Glacier restores
#[derive(Parser, Debug)]
#[command(
    name = "stackpilot",
    version,
    about = "Deploy and tear down CloudFormation stacks, and track Glacier restores",
    long_about = "Drives the `aws` command line tool.

Usage:
  stackpilot deploy --plan stackpilot.toml --environment dev --bucket-name my-artifacts
  stackpilot teardown --plan stackpilot.toml --environment dev --force
  stackpilot restore initiate --bucket my-backups --date 2024-03-01 --tier bulk
  stackpilot restore download --job-id restore-20240301-120000-ab12cd34 --destination ./restored"
)]
pub struct Args {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// AWS region (overrides the plan region)
    #[arg(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS CLI profile
    #[arg(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Directory for restore jobs and run reports
    #[arg(long, global = true, env = "STACKPILOT_STATE_DIR", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Path to the aws binary (default: found on PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub aws_bin: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy plan stacks in dependency order, retrying transient failures
    Deploy {
        /// Deployment plan file
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,

        /// Target environment (dev, staging, prod, ...)
        #[arg(short, long)]
        environment: String,

        /// Bucket for packaged templates; also `{{bucket_name}}` in the plan
        #[arg(long)]
        bucket_name: String,

        /// Only these components (repeatable)
        #[arg(short, long = "component", value_name = "NAME")]
        components: Vec<String>,

        /// Print the aws commands without running them
        #[arg(long)]
        dry_run: bool,

        /// Retries after the first attempt
        #[arg(long)]
        max_retries: Option<u32>,

        /// Seconds between attempts
        #[arg(long, value_name = "SECS")]
        retry_delay: Option<u64>,

        /// Bucket to ship the run report to
        #[arg(long)]
        report_bucket: Option<String>,
    },

    /// Delete plan stacks in reverse dependency order
    Teardown {
        /// Deployment plan file
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,

        /// Target environment
        #[arg(short, long)]
        environment: String,

        /// Only these components (repeatable)
        #[arg(short, long = "component", value_name = "NAME")]
        components: Vec<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Seconds to wait for each stack to disappear
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Seconds between status checks
        #[arg(long, value_name = "SECS")]
        poll_interval: Option<u64>,

        /// Bucket to ship the run report to
        #[arg(long)]
        report_bucket: Option<String>,
    },

    /// Show the current status of plan stacks
    Status {
        /// Deployment plan file
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,

        /// Target environment
        #[arg(short, long)]
        environment: String,

        /// Only these components (repeatable)
        #[arg(short, long = "component", value_name = "NAME")]
        components: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Glacier restore jobs
    Restore {
        /// Restore operation
        #[command(subcommand)]
        action: RestoreCommand,
    },
}

/// Where to look for archived objects
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Bucket holding the archives
    #[arg(long)]
    pub bucket: String,

    /// Backup date, YYYY-MM-DD
    #[arg(long)]
    pub date: String,

    /// Key prefix before the date part
    #[arg(long, default_value = DEFAULT_BASE_PREFIX)]
    pub prefix: String,

    /// strftime pattern for the date part of the prefix
    #[arg(long, default_value = DEFAULT_DATE_FORMAT)]
    pub date_format: String,
}

/// Restore sub-commands
#[derive(Subcommand, Debug)]
pub enum RestoreCommand {
    /// List archived objects under a date prefix
    List {
        #[command(flatten)]
        source: SourceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate retrieval cost per tier
    Estimate {
        /// Price this many GB instead of listing a bucket
        #[arg(long, value_name = "GB", conflicts_with_all = ["bucket", "date"])]
        size_gb: Option<f64>,

        /// Bucket holding the archives
        #[arg(long, requires = "date")]
        bucket: Option<String>,

        /// Backup date, YYYY-MM-DD
        #[arg(long, requires = "bucket")]
        date: Option<String>,

        /// Key prefix before the date part
        #[arg(long, default_value = DEFAULT_BASE_PREFIX)]
        prefix: String,

        /// strftime pattern for the date part of the prefix
        #[arg(long, default_value = DEFAULT_DATE_FORMAT)]
        date_format: String,

        /// Only this tier
        #[arg(long, value_enum)]
        tier: Option<RestoreTier>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Request restoration and record a job
    Initiate {
        #[command(flatten)]
        source: SourceArgs,

        /// Retrieval tier
        #[arg(long, value_enum, default_value_t = RestoreTier::Standard)]
        tier: RestoreTier,

        /// Days the restored copies stay available
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,

        /// Skip the cost confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Re-check restore progress of a job
    Status {
        /// Job identifier
        #[arg(long)]
        job_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy restored objects of a job to a local directory
    Download {
        /// Job identifier
        #[arg(long)]
        job_id: String,

        /// Destination directory
        #[arg(long, value_name = "DIR")]
        destination: PathBuf,

        /// Copy again objects an earlier run already downloaded
        #[arg(long)]
        overwrite: bool,
    },

    /// List tracked jobs
    Jobs {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove job records
    Cleanup {
        /// Job to remove
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        job_id: Option<String>,

        /// Remove every job record
        #[arg(long)]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Command {
    /// Name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deploy { .. } => "deploy",
            Command::Teardown { .. } => "teardown",
            Command::Status { .. } => "status",
            Command::Restore { action } => match action {
                RestoreCommand::List { .. } => "restore list",
                RestoreCommand::Estimate { .. } => "restore estimate",
                RestoreCommand::Initiate { .. } => "restore initiate",
                RestoreCommand::Status { .. } => "restore status",
                RestoreCommand::Download { .. } => "restore download",
                RestoreCommand::Jobs { .. } => "restore jobs",
                RestoreCommand::Cleanup { .. } => "restore cleanup",
            },
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Deploy { environment, .. }
            | Command::Teardown { environment, .. }
            | Command::Status { environment, .. } => {
                if environment.trim().is_empty() {
                    return Err("--environment must not be empty".to_string());
                }
            }
            Command::Restore {
                action: RestoreCommand::Estimate { size_gb, bucket, .. },
            } => {
                if size_gb.is_none() && bucket.is_none() {
                    return Err("restore estimate needs --size-gb or --bucket and --date".to_string());
                }
                if let Some(gb) = size_gb
                    && (!gb.is_finite() || *gb < 0.0)
                {
                    return Err(format!("--size-gb must be a non-negative number, got {gb}"));
                }
            }
            Command::Restore { .. } => {}
        }

        self.operation_config().validate()
    }

    /// Timing configuration: environment defaults overlaid with flags
    pub fn operation_config(&self) -> OperationConfig {
        let mut config = OperationConfig::from_env();
        match &self.command {
            Command::Deploy {
                max_retries,
                retry_delay,
                ..
            } => {
                if let Some(retries) = max_retries {
                    config.max_retries = *retries;
                }
                if let Some(secs) = retry_delay {
                    config.retry_delay = Duration::from_secs(*secs);
                }
            }
            Command::Teardown {
                timeout,
                poll_interval,
                ..
            } => {
                if let Some(secs) = timeout {
                    config.teardown_timeout = Duration::from_secs(*secs);
                }
                if let Some(secs) = poll_interval {
                    config.poll_interval = Duration::from_secs(*secs);
                }
            }
            _ => {}
        }
        config
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    /// State directory
    pub state_dir: PathBuf,
    /// Region override
    pub region: Option<String>,
    /// AWS CLI profile
    pub profile: Option<String>,
    /// Explicit aws binary
    pub aws_bin: Option<PathBuf>,
    /// Timing configuration
    pub operation: OperationConfig,
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print verbose message
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print progress message
    pub fn progress_println(&self, message: &str) {
        let _ = self.output.progress(message);
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        let _ = self.output.section(title);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if verbose output is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            state_dir: args.state_dir.clone().unwrap_or_else(default_state_dir),
            region: args.region.clone(),
            profile: args.profile.clone(),
            aws_bin: args.aws_bin.clone(),
            operation: args.operation_config(),
        }
    }
}
