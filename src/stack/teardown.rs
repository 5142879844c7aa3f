//! Delete a stack and poll until it is gone, failed, or out of time.

use crate::aws::{AwsRunner, StackClient};
use crate::error::Result;
use crate::stack::StackStatus;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

/// Polling cadence and wall-clock budget for a teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownPolicy {
    /// Fixed sleep between status checks
    pub poll_interval: Duration,
    /// Total time allowed before reporting a timeout
    pub timeout: Duration,
}

impl Default for TeardownPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            timeout: Duration::from_secs(1800),
        }
    }
}

/// The three ways a teardown can end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Stack reached NOT_FOUND (or was never there)
    Deleted {
        /// Time spent
        elapsed: Duration,
    },
    /// Stack reached DELETE_FAILED
    Failed {
        /// Status that ended the wait
        status: StackStatus,
        /// Time spent
        elapsed: Duration,
    },
    /// Budget ran out before a terminal state was seen
    TimedOut {
        /// Last status observed
        last_status: StackStatus,
        /// Time spent
        elapsed: Duration,
    },
}

impl TeardownOutcome {
    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            TeardownOutcome::Deleted { .. } => "deleted",
            TeardownOutcome::Failed { .. } => "failed",
            TeardownOutcome::TimedOut { .. } => "timeout",
        }
    }

    /// Time spent in the teardown
    pub fn elapsed(&self) -> Duration {
        match self {
            TeardownOutcome::Deleted { elapsed }
            | TeardownOutcome::Failed { elapsed, .. }
            | TeardownOutcome::TimedOut { elapsed, .. } => *elapsed,
        }
    }
}

/// Issue `delete-stack` and poll on a fixed interval until the stack is
/// gone, lands in DELETE_FAILED, or `policy.timeout` elapses.
///
/// A stack that does not exist is reported as deleted without issuing a
/// delete. Status checks that fail transiently are logged and the poll
/// continues; they count against the same budget. Every aws call is cut
/// off at the deadline, and a terminal status seen at or after it is
/// reported as a timeout.
pub async fn teardown_stack<R: AwsRunner>(
    aws: &R,
    name: &str,
    region: &str,
    policy: &TeardownPolicy,
) -> Result<TeardownOutcome> {
    let client = StackClient::new(aws);
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let out_of_time = |last_status: StackStatus| TeardownOutcome::TimedOut {
        last_status,
        elapsed: started.elapsed(),
    };

    let Ok(initial) = timeout_at(deadline, client.status(name, region)).await else {
        log::warn!("Initial status check for {name} outlived the teardown budget");
        return Ok(out_of_time(StackStatus::Other("UNKNOWN".to_string())));
    };
    let mut last_status = initial?;
    if last_status.is_gone() {
        log::info!("Stack {name} does not exist, nothing to delete");
        return Ok(TeardownOutcome::Deleted {
            elapsed: started.elapsed(),
        });
    }

    log::info!("Deleting stack {name} (status {last_status})");
    match timeout_at(deadline, client.delete(name, region)).await {
        Ok(result) => result?,
        Err(_) => {
            log::warn!("delete-stack for {name} outlived the teardown budget");
            return Ok(out_of_time(last_status));
        }
    }

    loop {
        let remaining = policy.timeout.saturating_sub(started.elapsed());
        tokio::time::sleep(policy.poll_interval.min(remaining)).await;

        let Ok(polled) = timeout_at(deadline, client.status(name, region)).await else {
            log::warn!("Status check for {name} outlived the teardown budget");
            return Ok(out_of_time(last_status));
        };
        let in_budget = started.elapsed() < policy.timeout;

        match polled {
            Ok(status) if in_budget && status.is_gone() => {
                return Ok(TeardownOutcome::Deleted {
                    elapsed: started.elapsed(),
                });
            }
            Ok(StackStatus::DeleteFailed) if in_budget => {
                return Ok(TeardownOutcome::Failed {
                    status: StackStatus::DeleteFailed,
                    elapsed: started.elapsed(),
                });
            }
            Ok(status) => {
                log::debug!("Stack {name} still {status}");
                last_status = status;
            }
            Err(e) if e.is_recoverable() => {
                log::warn!("Status check for {name} failed, will poll again: {e}");
            }
            Err(e) => return Err(e),
        }

        if started.elapsed() >= policy.timeout {
            return Ok(out_of_time(last_status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::{FakeAws, Reply, ok, slow, stack_missing, stack_status};

    fn policy(poll_secs: u64, timeout_secs: u64) -> TeardownPolicy {
        TeardownPolicy {
            poll_interval: Duration::from_secs(poll_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_stack_is_deleted_without_delete_call() {
        let aws = FakeAws::new().on(&["describe-stacks"], [stack_missing()]);

        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(5, 60))
            .await
            .unwrap();
        assert!(matches!(outcome, TeardownOutcome::Deleted { .. }));
        assert_eq!(aws.count(&["delete-stack"]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_not_found() {
        let aws = FakeAws::new()
            .on(
                &["describe-stacks"],
                [
                    stack_status("CREATE_COMPLETE"),
                    stack_status("DELETE_IN_PROGRESS"),
                    stack_status("DELETE_IN_PROGRESS"),
                    stack_missing(),
                ],
            )
            .on(&["delete-stack"], [ok("")]);

        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(5, 60))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TeardownOutcome::Deleted {
                elapsed: Duration::from_secs(15)
            }
        );
        assert_eq!(aws.count(&["delete-stack"]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_failed_is_reported_as_failure() {
        let aws = FakeAws::new()
            .on(
                &["describe-stacks"],
                [
                    stack_status("UPDATE_COMPLETE"),
                    stack_status("DELETE_IN_PROGRESS"),
                    stack_status("DELETE_FAILED"),
                ],
            )
            .on(&["delete-stack"], [ok("")]);

        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(5, 60))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            TeardownOutcome::Failed {
                status: StackStatus::DeleteFailed,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_timeout_when_budget_runs_out() {
        let aws = FakeAws::new()
            .on(
                &["describe-stacks"],
                [
                    stack_status("CREATE_COMPLETE"),
                    stack_status("DELETE_IN_PROGRESS"),
                ],
            )
            .on(&["delete-stack"], [ok("")]);

        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(10, 25))
            .await
            .unwrap();
        match outcome {
            TeardownOutcome::TimedOut {
                last_status,
                elapsed,
            } => {
                assert_eq!(last_status, StackStatus::DeleteInProgress);
                assert_eq!(elapsed, Duration::from_secs(25));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // 1 initial check + polls at 10s, 20s, 25s
        assert_eq!(aws.count(&["describe-stacks"]), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_status_errors_keep_polling() {
        let aws = FakeAws::new()
            .on(
                &["describe-stacks"],
                [
                    stack_status("CREATE_COMPLETE"),
                    Reply::Timeout,
                    stack_missing(),
                ],
            )
            .on(&["delete-stack"], [ok("")]);

        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(5, 60))
            .await
            .unwrap();
        assert_eq!(outcome.label(), "deleted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_status_call_is_cut_off_at_deadline() {
        let aws = FakeAws::new()
            .on(
                &["describe-stacks"],
                [stack_status("CREATE_COMPLETE"), slow(100, stack_missing())],
            )
            .on(&["delete-stack"], [ok("")]);

        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(5, 25))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TeardownOutcome::TimedOut {
                last_status: StackStatus::CreateComplete,
                elapsed: Duration::from_secs(25),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delete_call_is_cut_off_at_deadline() {
        let aws = FakeAws::new()
            .on(&["describe-stacks"], [stack_status("UPDATE_COMPLETE")])
            .on(&["delete-stack"], [slow(100, ok(""))]);

        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(5, 25))
            .await
            .unwrap();
        assert_eq!(outcome.label(), "timeout");
        assert_eq!(outcome.elapsed(), Duration::from_secs(25));
        assert_eq!(aws.count(&["describe-stacks"]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_after_deadline_is_a_timeout() {
        let aws = FakeAws::new()
            .on(
                &["describe-stacks"],
                [
                    stack_status("CREATE_COMPLETE"),
                    stack_status("DELETE_IN_PROGRESS"),
                    stack_status("DELETE_IN_PROGRESS"),
                    stack_status("DELETE_FAILED"),
                ],
            )
            .on(&["delete-stack"], [ok("")]);

        // polls land at 10s, 20s and 25s; the last one is at the deadline
        let outcome = teardown_stack(&aws, "app-dev-db", "us-east-1", &policy(10, 25))
            .await
            .unwrap();
        assert_eq!(outcome.label(), "timeout");
    }
}
