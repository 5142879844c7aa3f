//! Stack lifecycle helpers: status, deploy-with-retry, teardown-with-timeout.
//!
//! These are independent operations sharing no process state; each one talks
//! to CloudFormation through an [`crate::aws::AwsRunner`].

mod deploy;
mod descriptor;
mod status;
mod teardown;

pub use deploy::{AttemptOutcome, DeployPolicy, DeployReport, deploy_with_retry, run_attempt};
pub use descriptor::{Capability, StackDescriptor, validate_stack_name};
pub use status::StackStatus;
pub use teardown::{TeardownOutcome, TeardownPolicy, teardown_stack};
