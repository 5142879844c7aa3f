//! The persisted restore job record.

use crate::aws::ObjectSummary;
use crate::error::{Result, StateError};
use crate::restore::{CostEstimate, RestoreTier};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Current version of the job record format
pub const JOB_FORMAT_VERSION: &str = "1.0";

static ONGOING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"ongoing-request="(true|false)""#).expect("ongoing-request regex is valid")
});

static EXPIRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"expiry-date="([^"]+)""#).expect("expiry-date regex is valid")
});

/// Restore state of one object, derived from its `x-amz-restore` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RestoreState {
    /// Archived and no restore requested
    NotRequested,
    /// Restore running
    InProgress,
    /// Temporary copy available
    Completed {
        /// When the temporary copy expires
        expiry: Option<String>,
    },
    /// Not archived, readable as-is
    Available,
}

impl RestoreState {
    /// Interpret a head-object response
    pub fn from_head(restore_header: Option<&str>, storage_class: Option<&str>) -> Self {
        match restore_header {
            Some(header) => {
                let ongoing = ONGOING_RE
                    .captures(header)
                    .map(|c| &c[1] == "true")
                    .unwrap_or(false);
                if ongoing {
                    RestoreState::InProgress
                } else {
                    RestoreState::Completed {
                        expiry: EXPIRY_RE.captures(header).map(|c| c[1].to_string()),
                    }
                }
            }
            None => match storage_class {
                Some("GLACIER") | Some("DEEP_ARCHIVE") => RestoreState::NotRequested,
                _ => RestoreState::Available,
            },
        }
    }

    /// The object can be copied now
    pub fn is_ready(&self) -> bool {
        matches!(self, RestoreState::Completed { .. } | RestoreState::Available)
    }

    /// Short label for tables
    pub fn label(&self) -> &'static str {
        match self {
            RestoreState::NotRequested => "not requested",
            RestoreState::InProgress => "in progress",
            RestoreState::Completed { .. } => "completed",
            RestoreState::Available => "available",
        }
    }
}

/// One object tracked by a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedObject {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Storage class at listing time
    pub storage_class: String,
    /// Whether S3 accepted the restore request
    pub requested: bool,
    /// Why the request was rejected, if it was
    #[serde(default)]
    pub request_error: Option<String>,
    /// Last observed restore state
    pub restore: RestoreState,
    /// When `restore` was last refreshed
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
    /// When the object was copied locally
    #[serde(default)]
    pub downloaded_at: Option<DateTime<Utc>>,
    /// Where it was copied to
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

/// Locally persisted record of one restore request batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreJob {
    /// Version of the record format
    pub format_version: String,
    /// Generated identifier, also the file name
    pub job_id: String,
    /// Source bucket
    pub bucket: String,
    /// Key prefix the candidates were listed under
    pub prefix: String,
    /// Retrieval tier
    pub tier: RestoreTier,
    /// Days the restored copy stays available
    pub days: u32,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
    /// Objects in the job
    pub files: Vec<TrackedObject>,
    /// Sum of object sizes
    pub total_size_bytes: u64,
    /// Retrieval cost at `tier`
    pub estimated_cost_usd: f64,
}

/// Aggregate completion across a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    /// Objects tracked
    pub total: usize,
    /// Ready to download
    pub completed: usize,
    /// Still restoring
    pub in_progress: usize,
    /// Never requested or request rejected
    pub not_requested: usize,
    /// Already copied locally
    pub downloaded: usize,
}

impl JobProgress {
    /// Share of objects ready, 0-100
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }

    /// Every object is ready
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

impl RestoreJob {
    /// Create a job for archived objects; nothing has been requested yet
    pub fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        tier: RestoreTier,
        days: u32,
        objects: &[ObjectSummary],
    ) -> Self {
        let now = Utc::now();
        let total_size_bytes = objects.iter().map(|o| o.size).sum();

        Self {
            format_version: JOB_FORMAT_VERSION.to_string(),
            job_id: generate_job_id(now),
            bucket: bucket.into(),
            prefix: prefix.into(),
            tier,
            days,
            created_at: now,
            updated_at: now,
            files: objects
                .iter()
                .map(|o| TrackedObject {
                    key: o.key.clone(),
                    size_bytes: o.size,
                    storage_class: o.storage_class.clone(),
                    requested: false,
                    request_error: None,
                    restore: RestoreState::NotRequested,
                    checked_at: None,
                    downloaded_at: None,
                    local_path: None,
                })
                .collect(),
            total_size_bytes,
            estimated_cost_usd: CostEstimate::for_bytes(total_size_bytes, tier).cost_usd,
        }
    }

    /// Count objects by state
    pub fn progress(&self) -> JobProgress {
        let mut progress = JobProgress {
            total: self.files.len(),
            ..JobProgress::default()
        };
        for file in &self.files {
            match file.restore {
                RestoreState::Completed { .. } | RestoreState::Available => progress.completed += 1,
                RestoreState::InProgress => progress.in_progress += 1,
                RestoreState::NotRequested => progress.not_requested += 1,
            }
            if file.downloaded_at.is_some() {
                progress.downloaded += 1;
            }
        }
        progress
    }

    /// Check the record can be handled by this build
    pub fn validate(&self) -> Result<()> {
        if self.format_version != JOB_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: JOB_FORMAT_VERSION.to_string(),
                found: self.format_version.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// One-line description
    pub fn summary(&self) -> String {
        let progress = self.progress();
        format!(
            "{} - s3://{}/{} - {} file(s), {:.2} GB, {} tier - {:.1}% ready",
            self.job_id,
            self.bucket,
            self.prefix,
            progress.total,
            self.total_size_bytes as f64 / crate::restore::BYTES_PER_GB,
            self.tier,
            progress.percent_complete()
        )
    }
}

/// `restore-YYYYMMDD-HHMMSS-xxxxxxxx`
pub fn generate_job_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("restore-{}-{}", now.format("%Y%m%d-%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(key: &str, size: u64, class: &str) -> ObjectSummary {
        ObjectSummary {
            key: key.to_string(),
            size,
            storage_class: class.to_string(),
        }
    }

    #[test]
    fn test_restore_header_parsing() {
        assert_eq!(
            RestoreState::from_head(Some(r#"ongoing-request="true""#), Some("GLACIER")),
            RestoreState::InProgress
        );
        assert_eq!(
            RestoreState::from_head(
                Some(r#"ongoing-request="false", expiry-date="Fri, 23 Dec 2012 00:00:00 GMT""#),
                Some("GLACIER")
            ),
            RestoreState::Completed {
                expiry: Some("Fri, 23 Dec 2012 00:00:00 GMT".to_string())
            }
        );
        assert_eq!(
            RestoreState::from_head(None, Some("DEEP_ARCHIVE")),
            RestoreState::NotRequested
        );
        assert_eq!(RestoreState::from_head(None, None), RestoreState::Available);
    }

    #[test]
    fn test_new_job_totals_and_cost() {
        let gb = 1024 * 1024 * 1024;
        let job = RestoreJob::new(
            "archive",
            "backups/2024/01/15/",
            RestoreTier::Standard,
            7,
            &[object("a.gz", 3 * gb, "GLACIER"), object("b.gz", gb, "GLACIER")],
        );

        assert!(job.job_id.starts_with("restore-"));
        assert_eq!(job.total_size_bytes, 4 * gb);
        assert!((job.estimated_cost_usd - 0.08).abs() < 1e-9);
        assert_eq!(job.progress().not_requested, 2);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_progress_counts() {
        let mut job = RestoreJob::new(
            "archive",
            "p/",
            RestoreTier::Bulk,
            1,
            &[
                object("a", 1, "GLACIER"),
                object("b", 1, "GLACIER"),
                object("c", 1, "GLACIER"),
                object("d", 1, "GLACIER"),
            ],
        );
        job.files[0].restore = RestoreState::Completed { expiry: None };
        job.files[0].downloaded_at = Some(Utc::now());
        job.files[1].restore = RestoreState::InProgress;
        job.files[2].restore = RestoreState::Available;

        let progress = job.progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.in_progress, 1);
        assert_eq!(progress.not_requested, 1);
        assert_eq!(progress.downloaded, 1);
        assert!((progress.percent_complete() - 50.0).abs() < 1e-9);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let mut job = RestoreJob::new("archive", "p/", RestoreTier::Bulk, 1, &[]);
        job.format_version = "0.9".to_string();
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_job_ids_are_unique() {
        let now = Utc::now();
        assert_ne!(generate_job_id(now), generate_job_id(now));
    }
}
