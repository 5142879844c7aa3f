//! Deploy command implementation.
//!
//! Deploys the selected plan stacks in dependency order. The first stack that
//! fails stops the run; stacks after it are recorded as skipped.

use super::helpers::{aws_cli, load_stacks};
use crate::aws::command_line;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::report::{RunReport, StackRunRecord, ship};
use crate::stack::deploy_with_retry;
use std::time::Instant;

/// Execute deploy command
pub(super) async fn execute_deploy(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let Command::Deploy {
        plan,
        environment,
        bucket_name,
        components,
        dry_run,
        report_bucket,
        ..
    } = &args.command
    else {
        unreachable!("execute_deploy called with non-Deploy command");
    };

    let (plan, stacks) = load_stacks(config, plan, environment, Some(bucket_name), components)?;

    if *dry_run {
        config.section("Dry run: commands that would run");
        for stack in &stacks {
            stack.descriptor.validate()?;
            config.println(&format!("# {}", stack.component));
            config.println(&command_line(&stack.descriptor.deploy_args()));
        }
        return Ok(0);
    }

    let aws = aws_cli(config)?;
    let deploy_policy = config.operation.deploy_policy();
    let teardown_policy = config.operation.teardown_policy();
    let mut report = RunReport::start("deploy", &plan.project, environment);
    let mut failure = None;

    config.section(&format!("Deploying {} stack(s) to {environment}", stacks.len()));

    for stack in &stacks {
        let name = stack.descriptor.name.clone();

        if failure.is_some() {
            report.record(StackRunRecord {
                component: stack.component.clone(),
                stack_name: name,
                outcome: "skipped".to_string(),
                attempts: 0,
                final_status: None,
                elapsed_secs: 0.0,
                error: None,
            });
            continue;
        }

        config.progress_println(&format!("Deploying {name}..."));
        let started = Instant::now();

        match deploy_with_retry(&aws, &stack.descriptor, &deploy_policy, &teardown_policy).await {
            Ok(outcome) => {
                config.success_println(&format!(
                    "{name}: {} after {} attempt(s) ({:.1}s)",
                    outcome.status,
                    outcome.attempts,
                    outcome.elapsed.as_secs_f64()
                ));
                report.record(StackRunRecord {
                    component: stack.component.clone(),
                    stack_name: name,
                    outcome: "deployed".to_string(),
                    attempts: outcome.attempts,
                    final_status: Some(outcome.status.to_string()),
                    elapsed_secs: outcome.elapsed.as_secs_f64(),
                    error: None,
                });
            }
            Err(e) => {
                report.record(StackRunRecord::deploy_failure(
                    &stack.component,
                    &name,
                    &e,
                    started.elapsed().as_secs_f64(),
                ));
                failure = Some(e);
            }
        }
    }

    report.finish();
    let path = report.write(&config.state_dir)?;
    config.verbose_println(&format!("Run report: {}", path.display()));
    if let Some(bucket) = report_bucket {
        let region = config.region.clone().or_else(|| plan.region.clone());
        ship(&aws, region, bucket, &report, &path).await;
    }

    match failure {
        Some(e) => Err(e),
        None => {
            config.success_println(&format!("Deployed {} stack(s)", stacks.len()));
            Ok(0)
        }
    }
}
