//! Candidate listing, restore requests, status refresh and download.

use crate::aws::{AwsRunner, ObjectSummary, RestoreRequestOutcome, S3Client};
use crate::error::{RestoreError, Result};
use crate::restore::{CostEstimate, RestoreJob, RestoreState, RestoreTier};
use crate::state::JobStore;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static BUCKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("bucket regex is valid")
});

/// Default key layout for dated backups
pub const DEFAULT_BASE_PREFIX: &str = "backups/";
/// Default strftime pattern appended to the base prefix
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m/%d/";

/// Which objects to consider: everything under a date-derived prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    /// Source bucket
    pub bucket: String,
    /// Prefix before the date part
    pub base_prefix: String,
    /// Backup date
    pub date: NaiveDate,
    /// strftime pattern for the date part
    pub date_format: String,
}

impl CandidateQuery {
    /// Build a query, validating bucket and date
    pub fn new(bucket: &str, date: &str, base_prefix: &str, date_format: &str) -> Result<Self> {
        validate_bucket_name(bucket)?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            RestoreError::InvalidDate {
                value: date.to_string(),
            }
        })?;
        let query = Self {
            bucket: bucket.to_string(),
            base_prefix: base_prefix.to_string(),
            date,
            date_format: date_format.to_string(),
        };
        query.prefix()?;
        Ok(query)
    }

    /// `base_prefix` followed by the formatted date
    pub fn prefix(&self) -> Result<String> {
        let mut prefix = self.base_prefix.clone();
        write!(prefix, "{}", self.date.format(&self.date_format)).map_err(|_| {
            RestoreError::InvalidDate {
                value: format!("{} (bad --date-format '{}')", self.date, self.date_format),
            }
        })?;
        Ok(prefix)
    }
}

/// Listing split into what needs restoring and what does not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateSet {
    /// Prefix listed
    pub prefix: String,
    /// GLACIER / DEEP_ARCHIVE objects
    pub archived: Vec<ObjectSummary>,
    /// Objects readable without a restore
    pub available: Vec<ObjectSummary>,
}

impl CandidateSet {
    /// Bytes that would have to be restored
    pub fn archived_bytes(&self) -> u64 {
        self.archived.iter().map(|o| o.size).sum()
    }

    /// Price of restoring every archived object at each tier
    pub fn estimates(&self) -> Vec<CostEstimate> {
        CostEstimate::all_tiers(self.archived_bytes())
    }
}

/// Outcome of one download pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    /// Keys copied in this invocation
    pub downloaded: Vec<String>,
    /// Keys skipped because the restore is not complete
    pub pending: Vec<String>,
    /// Keys skipped because an earlier invocation already copied them
    pub already_downloaded: Vec<String>,
    /// Keys whose copy failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Restore operations bound to one bucket client and one job store
pub struct RestoreTracker<'a, R> {
    s3: S3Client<'a, R>,
    store: &'a JobStore,
}

impl<'a, R: AwsRunner> RestoreTracker<'a, R> {
    /// Bind a runner and a store
    pub fn new(aws: &'a R, region: Option<String>, store: &'a JobStore) -> Self {
        Self {
            s3: S3Client::new(aws, region),
            store,
        }
    }

    /// List objects under the query prefix and split them by storage class
    pub async fn list_candidates(&self, query: &CandidateQuery) -> Result<CandidateSet> {
        let prefix = query.prefix()?;
        let objects = self.s3.list_objects(&query.bucket, &prefix).await?;
        log::debug!("Listed {} object(s) under s3://{}/{prefix}", objects.len(), query.bucket);

        let (archived, available) = objects.into_iter().partition(ObjectSummary::is_archived);
        Ok(CandidateSet {
            prefix,
            archived,
            available,
        })
    }

    /// Request restoration of every archived candidate and persist a job.
    ///
    /// Per-object failures are recorded in the job rather than aborting the
    /// batch. A tier the storage class cannot serve is rejected before any
    /// request is sent.
    pub async fn initiate(
        &self,
        query: &CandidateQuery,
        tier: RestoreTier,
        days: u32,
    ) -> Result<RestoreJob> {
        let candidates = self.list_candidates(query).await?;
        if candidates.archived.is_empty() {
            return Err(RestoreError::NoCandidates {
                bucket: query.bucket.clone(),
                prefix: candidates.prefix,
            }
            .into());
        }

        if let Some(unsupported) = candidates
            .archived
            .iter()
            .find(|o| !tier.supports(&o.storage_class))
        {
            return Err(RestoreError::TierNotSupported {
                key: unsupported.key.clone(),
                tier: tier.to_string(),
                storage_class: unsupported.storage_class.clone(),
            }
            .into());
        }

        let mut job = RestoreJob::new(&query.bucket, &candidates.prefix, tier, days, &candidates.archived);
        self.store.save(&mut job)?;
        log::info!(
            "Created restore job {} for {} object(s)",
            job.job_id,
            job.files.len()
        );

        for file in &mut job.files {
            match self.s3.restore_object(&job.bucket, &file.key, days, tier).await {
                Ok(outcome) => {
                    if outcome == RestoreRequestOutcome::AlreadyInProgress {
                        log::info!("Restore already running for {}", file.key);
                    }
                    file.requested = true;
                    file.restore = RestoreState::InProgress;
                }
                Err(e) => {
                    let failure = RestoreError::RequestFailed {
                        key: file.key.clone(),
                        reason: e.to_string(),
                    };
                    log::warn!("{failure}");
                    file.request_error = Some(e.to_string());
                }
            }
        }

        self.store.save(&mut job)?;
        Ok(job)
    }

    /// Re-read the restore header of every tracked object and persist the result
    pub async fn refresh(&self, job_id: &str) -> Result<RestoreJob> {
        let mut job = self.store.load(job_id)?;

        for file in &mut job.files {
            match self.s3.head_object(&job.bucket, &file.key).await {
                Ok(head) => {
                    file.restore =
                        RestoreState::from_head(head.restore.as_deref(), head.storage_class.as_deref());
                    file.checked_at = Some(Utc::now());
                }
                Err(e) => log::warn!("Could not check {}: {e}", file.key),
            }
        }

        self.store.save(&mut job)?;
        Ok(job)
    }

    /// Copy every restored object into `destination`, keeping key layout.
    ///
    /// Objects whose restore is not complete are skipped. Within one call a
    /// key is never copied twice; keys copied by earlier calls are skipped
    /// unless `overwrite` is set.
    pub async fn download(
        &self,
        job_id: &str,
        destination: &Path,
        overwrite: bool,
    ) -> Result<DownloadReport> {
        let mut job = self.store.load(job_id)?;
        let mut report = DownloadReport::default();
        let mut seen = HashSet::new();

        for index in 0..job.files.len() {
            let key = job.files[index].key.clone();
            if !seen.insert(key.clone()) {
                continue;
            }

            if job.files[index].downloaded_at.is_some() && !overwrite {
                report.already_downloaded.push(key);
                continue;
            }

            match self.s3.head_object(&job.bucket, &key).await {
                Ok(head) => {
                    job.files[index].restore =
                        RestoreState::from_head(head.restore.as_deref(), head.storage_class.as_deref());
                    job.files[index].checked_at = Some(Utc::now());
                }
                Err(e) => {
                    report.failed.push((key, e.to_string()));
                    continue;
                }
            }

            if !job.files[index].restore.is_ready() {
                report.pending.push(key);
                continue;
            }

            let local_path = match safe_relative_path(&key) {
                Ok(relative) => destination.join(relative),
                Err(e) => {
                    log::warn!("Not downloading {key}: {e}");
                    report.failed.push((key, e.to_string()));
                    continue;
                }
            };
            if let Some(parent) = local_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            match self.s3.download(&job.bucket, &key, &local_path).await {
                Ok(()) => {
                    log::info!("Downloaded {key} to {}", local_path.display());
                    job.files[index].downloaded_at = Some(Utc::now());
                    job.files[index].local_path = Some(local_path);
                    self.store.save(&mut job)?;
                    report.downloaded.push(key);
                }
                Err(e) => report.failed.push((key, e.to_string())),
            }
        }

        self.store.save(&mut job)?;
        Ok(report)
    }
}

/// Check a name against S3 bucket naming rules
pub fn validate_bucket_name(bucket: &str) -> Result<()> {
    if BUCKET_RE.is_match(bucket) && !bucket.contains("..") {
        Ok(())
    } else {
        Err(RestoreError::InvalidBucketName {
            name: bucket.to_string(),
        }
        .into())
    }
}

fn safe_relative_path(key: &str) -> Result<PathBuf> {
    let path = Path::new(key);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => {
                return Err(RestoreError::UnsafeKey {
                    key: key.to_string(),
                }
                .into());
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(RestoreError::UnsafeKey {
            key: key.to_string(),
        }
        .into());
    }
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::{FakeAws, fail, ok};
    use crate::error::OpsError;

    const LISTING: &str = r#"{"Contents":[
        {"Key":"backups/2024/01/15/db.gz","Size":2048,"StorageClass":"GLACIER"},
        {"Key":"backups/2024/01/15/logs.tar","Size":1024,"StorageClass":"DEEP_ARCHIVE"},
        {"Key":"backups/2024/01/15/manifest.json","Size":12}
    ]}"#;

    fn query() -> CandidateQuery {
        CandidateQuery::new("archive-bucket", "2024-01-15", DEFAULT_BASE_PREFIX, DEFAULT_DATE_FORMAT)
            .unwrap()
    }

    fn restored() -> crate::aws::fake::Reply {
        ok(r#"{"Restore":"ongoing-request=\"false\", expiry-date=\"Fri, 19 Jan 2024 00:00:00 GMT\"","StorageClass":"GLACIER"}"#)
    }

    fn restoring() -> crate::aws::fake::Reply {
        ok(r#"{"Restore":"ongoing-request=\"true\"","StorageClass":"DEEP_ARCHIVE"}"#)
    }

    #[test]
    fn test_prefix_from_date() {
        assert_eq!(query().prefix().unwrap(), "backups/2024/01/15/");

        let dashed = CandidateQuery::new("archive-bucket", "2024-01-15", "db/", "%Y-%m-%d/").unwrap();
        assert_eq!(dashed.prefix().unwrap(), "db/2024-01-15/");
    }

    #[test]
    fn test_query_validation() {
        assert!(CandidateQuery::new("Bad_Bucket", "2024-01-15", "", DEFAULT_DATE_FORMAT).is_err());
        assert!(CandidateQuery::new("archive-bucket", "15/01/2024", "", DEFAULT_DATE_FORMAT).is_err());
    }

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(
            safe_relative_path("backups/2024/db.gz").unwrap(),
            PathBuf::from("backups/2024/db.gz")
        );
        assert!(safe_relative_path("../../etc/passwd").is_err());
        assert!(safe_relative_path("/abs/key").is_err());
    }

    #[tokio::test]
    async fn test_list_candidates_splits_by_storage_class() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let aws = FakeAws::new().on(&["list-objects-v2"], [ok(LISTING)]);
        let tracker = RestoreTracker::new(&aws, None, &store);

        let set = tracker.list_candidates(&query()).await.unwrap();
        assert_eq!(set.archived.len(), 2);
        assert_eq!(set.available.len(), 1);
        assert_eq!(set.archived_bytes(), 3072);
    }

    #[tokio::test]
    async fn test_initiate_persists_job_recoverable_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let aws = FakeAws::new()
            .on(&["list-objects-v2"], [ok(LISTING)])
            .on(&["restore-object", "backups/2024/01/15/db.gz"], [ok("")])
            .on(
                &["restore-object", "backups/2024/01/15/logs.tar"],
                [fail("An error occurred (AccessDenied) when calling the RestoreObject operation")],
            );
        let tracker = RestoreTracker::new(&aws, None, &store);

        let job = tracker.initiate(&query(), RestoreTier::Standard, 5).await.unwrap();
        assert_eq!(job.files.len(), 2);

        let loaded = store.load(&job.job_id).unwrap();
        assert_eq!(loaded, job);
        assert!(loaded.files[0].requested);
        assert_eq!(loaded.files[0].restore, RestoreState::InProgress);
        assert!(!loaded.files[1].requested);
        assert!(loaded.files[1].request_error.as_deref().unwrap().contains("AccessDenied"));
    }

    #[tokio::test]
    async fn test_initiate_rejects_expedited_for_deep_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let aws = FakeAws::new().on(&["list-objects-v2"], [ok(LISTING)]);
        let tracker = RestoreTracker::new(&aws, None, &store);

        let err = tracker
            .initiate(&query(), RestoreTier::Expedited, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::Restore(RestoreError::TierNotSupported { .. })));
        assert_eq!(aws.count(&["restore-object"]), 0);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initiate_without_archived_objects_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let aws = FakeAws::new().on(&["list-objects-v2"], [ok("")]);
        let tracker = RestoreTracker::new(&aws, None, &store);

        let err = tracker.initiate(&query(), RestoreTier::Bulk, 1).await.unwrap_err();
        assert!(matches!(err, OpsError::Restore(RestoreError::NoCandidates { .. })));
    }

    #[tokio::test]
    async fn test_refresh_reports_per_object_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let aws = FakeAws::new()
            .on(&["list-objects-v2"], [ok(LISTING)])
            .on(&["restore-object"], [ok("")])
            .on(&["head-object", "backups/2024/01/15/db.gz"], [restored()])
            .on(&["head-object", "backups/2024/01/15/logs.tar"], [restoring()]);
        let tracker = RestoreTracker::new(&aws, None, &store);
        let job = tracker.initiate(&query(), RestoreTier::Bulk, 3).await.unwrap();

        let refreshed = tracker.refresh(&job.job_id).await.unwrap();
        let progress = refreshed.progress();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.in_progress, 1);
        assert!(refreshed.files.iter().all(|f| f.checked_at.is_some()));

        assert_eq!(store.load(&job.job_id).unwrap().progress(), progress);
    }

    #[tokio::test]
    async fn test_download_skips_pending_and_never_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let aws = FakeAws::new()
            .on(&["list-objects-v2"], [ok(LISTING)])
            .on(&["restore-object"], [ok("")])
            .on(&["head-object", "backups/2024/01/15/db.gz"], [restored()])
            .on(&["head-object", "backups/2024/01/15/logs.tar"], [restoring()])
            .on(&["s3", "cp"], [ok("")]);
        let tracker = RestoreTracker::new(&aws, None, &store);
        let mut job = tracker.initiate(&query(), RestoreTier::Bulk, 3).await.unwrap();

        // Duplicate entry for the same key must not produce a second copy
        let duplicate = job.files[0].clone();
        job.files.push(duplicate);
        store.save(&mut job).unwrap();

        let report = tracker.download(&job.job_id, dest.path(), false).await.unwrap();
        assert_eq!(report.downloaded, vec!["backups/2024/01/15/db.gz".to_string()]);
        assert_eq!(report.pending, vec!["backups/2024/01/15/logs.tar".to_string()]);
        assert_eq!(aws.count(&["s3", "cp"]), 1);

        let saved = store.load(&job.job_id).unwrap();
        assert!(saved.files[0].downloaded_at.is_some());
        assert_eq!(
            saved.files[0].local_path.as_deref(),
            Some(dest.path().join("backups/2024/01/15/db.gz").as_path())
        );

        // A second pass leaves the finished object alone
        let again = tracker.download(&job.job_id, dest.path(), false).await.unwrap();
        assert!(again.downloaded.is_empty());
        assert_eq!(again.already_downloaded, vec!["backups/2024/01/15/db.gz".to_string()]);
        assert_eq!(aws.count(&["s3", "cp"]), 1);
    }

    #[tokio::test]
    async fn test_download_failure_is_reported_and_not_marked() {
        let dir = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let aws = FakeAws::new()
            .on(&["list-objects-v2"], [ok(LISTING)])
            .on(&["restore-object"], [ok("")])
            .on(&["head-object"], [restored()])
            .on(&["s3", "cp"], [fail("download failed: Access Denied")]);
        let tracker = RestoreTracker::new(&aws, None, &store);
        let job = tracker.initiate(&query(), RestoreTier::Bulk, 3).await.unwrap();

        let report = tracker.download(&job.job_id, dest.path(), false).await.unwrap();
        assert_eq!(report.failed.len(), 2);
        assert!(store
            .load(&job.job_id)
            .unwrap()
            .files
            .iter()
            .all(|f| f.downloaded_at.is_none()));
    }

    #[tokio::test]
    async fn test_unsafe_key_does_not_stop_other_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let listing = r#"{"Contents":[
            {"Key":"backups/2024/01/15/../../escape.gz","Size":10,"StorageClass":"GLACIER"},
            {"Key":"backups/2024/01/15/db.gz","Size":2048,"StorageClass":"GLACIER"}
        ]}"#;
        let aws = FakeAws::new()
            .on(&["list-objects-v2"], [ok(listing)])
            .on(&["restore-object"], [ok("")])
            .on(&["head-object"], [restored()])
            .on(&["s3", "cp"], [ok("")]);
        let tracker = RestoreTracker::new(&aws, None, &store);
        let job = tracker.initiate(&query(), RestoreTier::Bulk, 3).await.unwrap();

        let report = tracker.download(&job.job_id, dest.path(), false).await.unwrap();
        assert_eq!(report.downloaded, vec!["backups/2024/01/15/db.gz".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "backups/2024/01/15/../../escape.gz");
        assert_eq!(aws.count(&["s3", "cp"]), 1);
    }
}
