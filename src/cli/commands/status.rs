//! Status command implementation.
//!
//! Displays the current CloudFormation status of each plan stack.

use super::helpers::{aws_cli, load_stacks};
use crate::aws::StackClient;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::stack::StackStatus;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct StackStatusRow {
    component: String,
    stack_name: String,
    region: String,
    status: StackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, String>,
}

/// Execute status command
pub(super) async fn execute_status(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let Command::Status {
        plan,
        environment,
        components,
        json,
    } = &args.command
    else {
        unreachable!("execute_status called with non-Status command");
    };

    let (_, stacks) = load_stacks(config, plan, environment, None, components)?;
    let aws = aws_cli(config)?;
    let client = StackClient::new(&aws);

    config.verbose_println("Checking stack status...");

    let mut rows = Vec::with_capacity(stacks.len());
    for stack in &stacks {
        let descriptor = &stack.descriptor;
        let summary = client.describe(&descriptor.name, &descriptor.region).await?;
        let (status, reason, outputs) = match summary {
            Some(summary) => (summary.status, summary.reason, summary.outputs),
            None => (StackStatus::NotFound, None, BTreeMap::new()),
        };
        rows.push(StackStatusRow {
            component: stack.component.clone(),
            stack_name: descriptor.name.clone(),
            region: descriptor.region.clone(),
            status,
            reason,
            outputs,
        });
    }

    if *json {
        config.output().data(&serde_json::to_string_pretty(&rows)?)?;
        return Ok(0);
    }

    let width = rows.iter().map(|r| r.stack_name.len()).max().unwrap_or(0);
    for row in &rows {
        let line = format!("{:<width$}  {}", row.stack_name, row.status);
        if row.status.is_non_recoverable() {
            config.error_println(&line);
        } else if row.status.is_in_progress() {
            config.progress_println(&line);
        } else if row.status.is_healthy() {
            config.success_println(&line);
        } else {
            config.println(&format!("  {line}"));
        }

        if let Some(reason) = &row.reason {
            config.indent(reason);
        }
        if config.is_verbose() {
            for (key, value) in &row.outputs {
                config.indent(&format!("{key} = {value}"));
            }
        }
    }

    Ok(0)
}
