//! # stackpilot
//!
//! Deployment helpers for CloudFormation stacks and a tracker for Glacier
//! restore jobs, both driven through the `aws` command line tool.
//!
//! ## Features
//!
//! - **Deploy with retry**: fixed-delay retries with a cap, aborting at once on
//!   non-recoverable stack states
//! - **Teardown with timeout**: delete and poll until gone, failed or out of time
//! - **Deployment plans**: TOML plans with dependency ordering and placeholders
//! - **Restore jobs**: list archives by date, price tiers, request restores,
//!   track progress and download restored objects
//!
//! ## Usage
//!
//! ```bash
//! stackpilot deploy --plan stackpilot.toml --environment dev --bucket-name my-artifacts
//! stackpilot teardown --plan stackpilot.toml --environment dev --force
//! stackpilot restore estimate --size-gb 250 --tier bulk
//! stackpilot restore initiate --bucket my-backups --date 2024-03-01
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod aws;
pub mod cli;
pub mod config;
pub mod error;
pub mod plan;
pub mod report;
pub mod restore;
pub mod stack;
pub mod state;

// Re-export main types for public API
pub use aws::{AwsCli, AwsRunner, CliOutput};
pub use cli::Args;
pub use config::OperationConfig;
pub use error::{OpsError, Result};
pub use plan::{DeploymentPlan, ResolveOptions, ResolvedStack};
pub use report::RunReport;
pub use restore::{CostEstimate, RestoreJob, RestoreTier, RestoreTracker};
pub use stack::{
    DeployPolicy, StackDescriptor, StackStatus, TeardownOutcome, TeardownPolicy, deploy_with_retry,
    teardown_stack,
};
pub use state::JobStore;
