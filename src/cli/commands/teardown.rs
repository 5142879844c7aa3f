//! Teardown command implementation.
//!
//! Deletes the selected plan stacks in reverse dependency order. Exit code is
//! 0 when every stack is gone, 1 when a stack ends in DELETE_FAILED and 2 when
//! the wait times out.

use super::helpers::{aws_cli, load_stacks, prompt_confirmation};
use crate::aws::S3Client;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::report::{RunReport, StackRunRecord, ship};
use crate::stack::{TeardownOutcome, teardown_stack};

/// Execute teardown command
pub(super) async fn execute_teardown(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let Command::Teardown {
        plan,
        environment,
        components,
        force,
        report_bucket,
        ..
    } = &args.command
    else {
        unreachable!("execute_teardown called with non-Teardown command");
    };

    let (plan, mut stacks) = load_stacks(config, plan, environment, None, components)?;
    stacks.reverse();

    if !force {
        config.println(&format!("About to delete {} stack(s):", stacks.len()));
        for stack in &stacks {
            config.indent(&format!("{} ({})", stack.descriptor.name, stack.descriptor.region));
        }
        if !prompt_confirmation("Continue with teardown?")? {
            config.println("Teardown cancelled");
            return Ok(0);
        }
    }

    let aws = aws_cli(config)?;
    let policy = config.operation.teardown_policy();
    let mut report = RunReport::start("teardown", &plan.project, environment);
    let mut exit_code = 0;
    let mut failure = None;

    config.section(&format!("Tearing down {} stack(s) in {environment}", stacks.len()));

    for stack in &stacks {
        let name = stack.descriptor.name.as_str();
        let region = stack.descriptor.region.as_str();

        if exit_code != 0 || failure.is_some() {
            report.record(StackRunRecord {
                component: stack.component.clone(),
                stack_name: name.to_string(),
                outcome: "skipped".to_string(),
                attempts: 0,
                final_status: None,
                elapsed_secs: 0.0,
                error: None,
            });
            continue;
        }

        let s3 = S3Client::new(&aws, Some(region.to_string()));
        for bucket in &stack.empty_buckets {
            config.progress_println(&format!("Emptying s3://{bucket}..."));
            if let Err(e) = s3.empty_bucket(bucket).await {
                log::warn!("Could not empty bucket {bucket}: {e}");
                config.warning_println(&format!("Could not empty s3://{bucket}: {e}"));
            }
        }

        config.progress_println(&format!("Deleting {name}..."));
        let outcome = match teardown_stack(&aws, name, region, &policy).await {
            Ok(outcome) => outcome,
            Err(e) => {
                report.record(StackRunRecord {
                    component: stack.component.clone(),
                    stack_name: name.to_string(),
                    outcome: "failed".to_string(),
                    attempts: 0,
                    final_status: None,
                    elapsed_secs: 0.0,
                    error: Some(e.to_string()),
                });
                failure = Some(e);
                continue;
            }
        };

        let elapsed = outcome.elapsed().as_secs_f64();
        let (final_status, error) = match &outcome {
            TeardownOutcome::Deleted { .. } => {
                config.success_println(&format!("{name}: deleted ({elapsed:.1}s)"));
                (None, None)
            }
            TeardownOutcome::Failed { status, .. } => {
                config.error_println(&format!("{name}: delete failed with {status}"));
                exit_code = 1;
                (Some(status.to_string()), Some(format!("stack ended in {status}")))
            }
            TeardownOutcome::TimedOut { last_status, .. } => {
                config.warning_println(&format!(
                    "{name}: still {last_status} after {elapsed:.0}s, giving up"
                ));
                exit_code = 2;
                (
                    Some(last_status.to_string()),
                    Some(format!("timed out after {elapsed:.0}s")),
                )
            }
        };

        report.record(StackRunRecord {
            component: stack.component.clone(),
            stack_name: name.to_string(),
            outcome: outcome.label().to_string(),
            attempts: 0,
            final_status,
            elapsed_secs: elapsed,
            error,
        });
    }

    report.finish();
    let path = report.write(&config.state_dir)?;
    config.verbose_println(&format!("Run report: {}", path.display()));
    if let Some(bucket) = report_bucket {
        let region = config.region.clone().or_else(|| plan.region.clone());
        ship(&aws, region, bucket, &report, &path).await;
    }

    if let Some(e) = failure {
        return Err(e);
    }
    if exit_code == 0 {
        config.success_println(&format!("Deleted {} stack(s)", stacks.len()));
    }
    Ok(exit_code)
}
