//! Deploy a stack with a capped, fixed-delay retry loop.

use crate::aws::{AwsRunner, StackClient};
use crate::error::{Result, StackError};
use crate::stack::{StackDescriptor, StackStatus, TeardownOutcome, TeardownPolicy, teardown_stack};
use std::time::Duration;
use tokio::time::Instant;

/// Retry cap and delay for a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployPolicy {
    /// Retries after the first attempt (0 = try once)
    pub max_retries: u32,
    /// Fixed sleep between attempts
    pub retry_delay: Duration,
}

impl Default for DeployPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(30),
        }
    }
}

/// Classification of a single deploy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The deploy call exited zero
    Success,
    /// Worth another attempt
    Transient {
        /// What went wrong
        reason: String,
        /// Status seen after the failure, if it could be read
        status: Option<StackStatus>,
    },
    /// The stack is stuck; retrying cannot help
    Fatal(StackStatus),
}

/// Result of a successful deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    /// Stack name
    pub stack: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Status read after the deploy call returned
    pub status: StackStatus,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

/// Deploy `descriptor`, retrying transient failures.
///
/// The loop makes at most `1 + policy.max_retries` deploy calls. After any
/// failed call the stack status is read; ROLLBACK_FAILED, DELETE_FAILED and
/// the other non-recoverable states abort immediately regardless of retries
/// left. A stack left in ROLLBACK_COMPLETE is deleted (using `teardown`)
/// before the next attempt, since CloudFormation refuses to update it.
///
/// Success means the deploy call exited zero. The status in the returned
/// report comes from one follow-up describe and is not waited on.
pub async fn deploy_with_retry<R: AwsRunner>(
    aws: &R,
    descriptor: &StackDescriptor,
    policy: &DeployPolicy,
    teardown: &TeardownPolicy,
) -> Result<DeployReport> {
    descriptor.validate()?;

    let client = StackClient::new(aws);
    let name = descriptor.name.as_str();
    let region = descriptor.region.as_str();
    let started = Instant::now();

    let initial = client.status(name, region).await?;
    if initial.is_non_recoverable() {
        return Err(non_recoverable(name, &initial, 0));
    }
    if initial.requires_replacement() {
        replace_rolled_back(aws, name, region, teardown, 0).await?;
    }

    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        log::info!("Deploying {name} (attempt {attempt}/{max_attempts})");

        match run_attempt(aws, descriptor).await? {
            AttemptOutcome::Success => {
                let status = match client.status(name, region).await {
                    Ok(status) => status,
                    Err(e) => {
                        log::warn!("Deploy of {name} succeeded but status check failed: {e}");
                        StackStatus::Other("UNKNOWN".to_string())
                    }
                };
                return Ok(DeployReport {
                    stack: name.to_string(),
                    attempts: attempt,
                    status,
                    elapsed: started.elapsed(),
                });
            }
            AttemptOutcome::Fatal(status) => {
                log::error!("Stack {name} is in {status}; not retrying");
                return Err(non_recoverable(name, &status, attempt));
            }
            AttemptOutcome::Transient { reason, status } => {
                if attempt >= max_attempts {
                    return Err(StackError::RetriesExhausted {
                        stack: name.to_string(),
                        attempts: attempt,
                        last_error: reason,
                    }
                    .into());
                }

                log::warn!(
                    "Deploy of {name} failed (attempt {attempt}/{max_attempts}): {reason}; retrying in {:.1}s",
                    policy.retry_delay.as_secs_f64()
                );
                tokio::time::sleep(policy.retry_delay).await;

                if status.as_ref().is_some_and(StackStatus::requires_replacement) {
                    replace_rolled_back(aws, name, region, teardown, attempt).await?;
                }
            }
        }
    }
}

/// Run one deploy call and classify it
pub async fn run_attempt<R: AwsRunner>(
    aws: &R,
    descriptor: &StackDescriptor,
) -> Result<AttemptOutcome> {
    let client = StackClient::new(aws);

    let reason = match client.deploy(descriptor).await {
        Ok(out) if out.success() => return Ok(AttemptOutcome::Success),
        Ok(out) => out.stderr.trim().to_string(),
        Err(e) if e.is_recoverable() => e.to_string(),
        Err(e) => return Err(e),
    };

    match client.status(&descriptor.name, &descriptor.region).await {
        Ok(status) if status.is_non_recoverable() => Ok(AttemptOutcome::Fatal(status)),
        Ok(status) => Ok(AttemptOutcome::Transient {
            reason,
            status: Some(status),
        }),
        Err(e) if e.is_recoverable() => {
            log::debug!("Could not read status of {} after failure: {e}", descriptor.name);
            Ok(AttemptOutcome::Transient {
                reason,
                status: None,
            })
        }
        Err(e) => Err(e),
    }
}

async fn replace_rolled_back<R: AwsRunner>(
    aws: &R,
    name: &str,
    region: &str,
    teardown: &TeardownPolicy,
    attempts: u32,
) -> Result<()> {
    log::warn!("Stack {name} is in ROLLBACK_COMPLETE and cannot be updated; deleting it first");
    match teardown_stack(aws, name, region, teardown).await? {
        TeardownOutcome::Deleted { .. } => Ok(()),
        TeardownOutcome::Failed { status, .. } => Err(non_recoverable(name, &status, attempts)),
        TeardownOutcome::TimedOut {
            last_status,
            elapsed,
        } => Err(StackError::DeleteTimedOut {
            stack: name.to_string(),
            elapsed_secs: elapsed.as_secs(),
            last_status: last_status.to_string(),
        }
        .into()),
    }
}

fn non_recoverable(name: &str, status: &StackStatus, attempts: u32) -> crate::error::OpsError {
    StackError::NonRecoverableState {
        stack: name.to_string(),
        status: status.to_string(),
        attempts,
    }
    .into()
}
