//! Run reports for deploy and teardown.
//!
//! One JSON file per run under `<state_dir>/reports/`. When a report bucket
//! is configured the file is also copied to S3; that upload is the only
//! failure stackpilot swallows.

use crate::aws::{AwsRunner, S3Client};
use crate::error::{OpsError, Result, StackError};
use crate::state::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happened to one stack during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRunRecord {
    /// Plan component
    pub component: String,
    /// Full stack name
    pub stack_name: String,
    /// `deployed`, `deleted`, `failed`, `timeout`, `planned` or `skipped`
    pub outcome: String,
    /// Deploy attempts made (0 for teardown, or when no deploy call ran)
    pub attempts: u32,
    /// Last status seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_status: Option<String>,
    /// Wall-clock seconds spent on this stack
    pub elapsed_secs: f64,
    /// Error message when the stack failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StackRunRecord {
    /// Record for a stack whose deploy returned `error`
    pub fn deploy_failure(
        component: &str,
        stack_name: &str,
        error: &OpsError,
        elapsed_secs: f64,
    ) -> Self {
        let final_status = match error {
            OpsError::Stack(StackError::NonRecoverableState { status, .. }) => Some(status.clone()),
            _ => None,
        };
        Self {
            component: component.to_string(),
            stack_name: stack_name.to_string(),
            outcome: "failed".to_string(),
            attempts: error.deploy_attempts().unwrap_or(0),
            final_status,
            elapsed_secs,
            error: Some(error.to_string()),
        }
    }
}

/// Record of one deploy or teardown invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: String,
    /// `deploy` or `teardown`
    pub command: String,
    /// Plan project
    pub project: String,
    /// Target environment
    pub environment: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Set by [`RunReport::finish`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Per-stack records, in processing order
    pub stacks: Vec<StackRunRecord>,
}

impl RunReport {
    /// Start a report now
    pub fn start(command: &str, project: &str, environment: &str) -> Self {
        let started_at = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            run_id: format!(
                "{command}-{}-{}",
                started_at.format("%Y%m%d-%H%M%S"),
                &suffix[..8]
            ),
            command: command.to_string(),
            project: project.to_string(),
            environment: environment.to_string(),
            started_at,
            finished_at: None,
            stacks: Vec::new(),
        }
    }

    /// Append a stack record
    pub fn record(&mut self, record: StackRunRecord) {
        self.stacks.push(record);
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Write to `<state_dir>/reports/<run_id>.json` and return the path
    pub fn write(&self, state_dir: &Path) -> Result<PathBuf> {
        let path = state_dir.join("reports").join(format!("{}.json", self.run_id));
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(&path, &json)?;
        log::debug!("Run report written to {}", path.display());
        Ok(path)
    }

    /// Object key used when shipping to S3
    pub fn s3_key(&self) -> String {
        format!(
            "stackpilot/{}/{}/{}.json",
            self.project, self.environment, self.run_id
        )
    }
}

/// Upload a written report. Failures are logged and otherwise ignored.
pub async fn ship<R: AwsRunner>(
    aws: &R,
    region: Option<String>,
    bucket: &str,
    report: &RunReport,
    path: &Path,
) -> bool {
    let key = report.s3_key();
    match S3Client::new(aws, region).upload(path, bucket, &key).await {
        Ok(()) => {
            log::info!("Run report shipped to s3://{bucket}/{key}");
            true
        }
        Err(e) => {
            log::warn!("Could not ship run report to s3://{bucket}/{key}: {e}");
            false
        }
    }
}
