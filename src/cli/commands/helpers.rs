//! Shared helper functions for command execution.

use crate::aws::AwsCli;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::plan::{DeploymentPlan, ResolveOptions, ResolvedStack};
use std::path::Path;

/// Prompt user for confirmation with y/n input
pub(super) fn prompt_confirmation(prompt: &str) -> std::io::Result<bool> {
    use std::io::Write;

    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    let response = input.trim().to_lowercase();
    Ok(matches!(response.as_str(), "y" | "yes"))
}

/// Locate the aws binary with the configured profile and call timeout
pub(super) fn aws_cli(config: &RuntimeConfig) -> Result<AwsCli> {
    AwsCli::locate(
        config.aws_bin.as_deref(),
        config.profile.clone(),
        config.operation.aws_call_timeout,
    )
}

/// Load a plan and resolve the selected stacks for one environment
pub(super) fn load_stacks(
    config: &RuntimeConfig,
    plan_path: &Path,
    environment: &str,
    bucket_name: Option<&str>,
    components: &[String],
) -> Result<(DeploymentPlan, Vec<ResolvedStack>)> {
    let plan = DeploymentPlan::load(plan_path)?;
    config.verbose_println(&format!(
        "Loaded plan for project '{}' ({} stack(s))",
        plan.project,
        plan.stacks.len()
    ));

    let stacks = plan.resolve(&ResolveOptions {
        environment,
        bucket_name,
        region: config.region.as_deref(),
        components,
    })?;
    Ok((plan, stacks))
}

/// Format a byte count as GB with two decimals
pub(super) fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / crate::restore::BYTES_PER_GB)
}
