//! CloudFormation calls: describe, deploy, delete.

use super::{AwsRunner, CliOutput, args, command_line};
use crate::error::{AwsError, Result};
use crate::stack::{StackDescriptor, StackStatus};
use serde::Deserialize;
use std::collections::BTreeMap;

/// What `describe-stacks` tells us about one stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    /// Current status
    pub status: StackStatus,
    /// Status reason, if CloudFormation gave one
    pub reason: Option<String>,
    /// Stack outputs (key -> value)
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    #[serde(default)]
    stacks: Vec<DescribedStack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribedStack {
    stack_status: String,
    #[serde(default)]
    stack_status_reason: Option<String>,
    #[serde(default)]
    outputs: Vec<DescribedOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribedOutput {
    output_key: String,
    #[serde(default)]
    output_value: String,
}

/// CloudFormation operations over an [`AwsRunner`]
pub struct StackClient<'a, R> {
    aws: &'a R,
}

impl<'a, R: AwsRunner> StackClient<'a, R> {
    /// Wrap a runner
    pub fn new(aws: &'a R) -> Self {
        Self { aws }
    }

    /// Describe a stack; `None` when it does not exist
    pub async fn describe(&self, name: &str, region: &str) -> Result<Option<StackSummary>> {
        let argv = args([
            "cloudformation",
            "describe-stacks",
            "--stack-name",
            name,
            "--region",
            region,
            "--output",
            "json",
        ]);
        let out = self.aws.run(&argv).await?;

        if !out.success() {
            if is_missing_stack(&out) {
                return Ok(None);
            }
            return out.into_result(&argv).map(|_| None);
        }

        let response: DescribeStacksResponse =
            serde_json::from_str(&out.stdout).map_err(|e| AwsError::UnexpectedOutput {
                command: command_line(&argv),
                reason: e.to_string(),
            })?;

        let Some(stack) = response.stacks.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(StackSummary {
            status: StackStatus::from(stack.stack_status),
            reason: stack.stack_status_reason,
            outputs: stack
                .outputs
                .into_iter()
                .map(|o| (o.output_key, o.output_value))
                .collect(),
        }))
    }

    /// Current status, `NOT_FOUND` when the stack does not exist
    pub async fn status(&self, name: &str, region: &str) -> Result<StackStatus> {
        Ok(self
            .describe(name, region)
            .await?
            .map(|s| s.status)
            .unwrap_or(StackStatus::NotFound))
    }

    /// Idempotent existence check
    pub async fn exists(&self, name: &str, region: &str) -> Result<bool> {
        Ok(!self.status(name, region).await?.is_gone())
    }

    /// Run `aws cloudformation deploy` once. The raw output is returned so
    /// the caller can classify failures.
    pub async fn deploy(&self, descriptor: &StackDescriptor) -> Result<CliOutput> {
        self.aws.run(&descriptor.deploy_args()).await
    }

    /// Issue `delete-stack`; returns as soon as the request is accepted
    pub async fn delete(&self, name: &str, region: &str) -> Result<()> {
        let argv = args([
            "cloudformation",
            "delete-stack",
            "--stack-name",
            name,
            "--region",
            region,
        ]);
        self.aws.run(&argv).await?.into_result(&argv)?;
        Ok(())
    }
}

fn is_missing_stack(out: &CliOutput) -> bool {
    out.stderr.contains("does not exist")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::{FakeAws, fail, ok, stack_missing};

    #[tokio::test]
    async fn test_describe_parses_status_and_outputs() {
        let aws = FakeAws::new().on(
            &["describe-stacks"],
            [ok(r#"{"Stacks":[{"StackName":"orders-dev-api","StackStatus":"UPDATE_COMPLETE",
                  "Outputs":[{"OutputKey":"ApiUrl","OutputValue":"https://example.test"}]}]}"#)],
        );
        let client = StackClient::new(&aws);

        let summary = client
            .describe("orders-dev-api", "us-east-1")
            .await
            .unwrap()
            .expect("stack exists");
        assert_eq!(summary.status, StackStatus::UpdateComplete);
        assert_eq!(summary.outputs["ApiUrl"], "https://example.test");
    }

    #[tokio::test]
    async fn test_missing_stack_reports_not_found() {
        let aws = FakeAws::new().on(&["describe-stacks"], [stack_missing()]);
        let client = StackClient::new(&aws);

        assert_eq!(
            client.status("orders-dev-api", "us-east-1").await.unwrap(),
            StackStatus::NotFound
        );
        assert!(!client.exists("orders-dev-api", "us-east-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_other_describe_failures_propagate() {
        let aws = FakeAws::new().on(&["describe-stacks"], [fail("Throttling: Rate exceeded")]);
        let client = StackClient::new(&aws);

        let err = client.status("orders-dev-api", "us-east-1").await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
