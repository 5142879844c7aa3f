//! S3 calls used by restore tracking and teardown.

use super::{AwsRunner, args, command_line};
use crate::error::{AwsError, Result};
use crate::restore::RestoreTier;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry from `list-objects-v2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectSummary {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Storage class; S3 omits it for STANDARD
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
}

impl ObjectSummary {
    /// Archived objects must be restored before they can be read
    pub fn is_archived(&self) -> bool {
        matches!(self.storage_class.as_str(), "GLACIER" | "DEEP_ARCHIVE")
    }
}

fn default_storage_class() -> String {
    "STANDARD".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjectsResponse {
    #[serde(default)]
    contents: Vec<ObjectSummary>,
}

/// Subset of `head-object` relevant to restores
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeadObject {
    /// Raw `x-amz-restore` header value
    #[serde(default)]
    pub restore: Option<String>,
    /// Storage class; absent for STANDARD
    #[serde(default)]
    pub storage_class: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub content_length: Option<u64>,
}

/// Result of a restore request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreRequestOutcome {
    /// A new restore was started
    Requested,
    /// A restore was already running for this object
    AlreadyInProgress,
}

/// S3 operations over an [`AwsRunner`]
pub struct S3Client<'a, R> {
    aws: &'a R,
    region: Option<String>,
}

impl<'a, R: AwsRunner> S3Client<'a, R> {
    /// Wrap a runner; region is optional for S3
    pub fn new(aws: &'a R, region: Option<String>) -> Self {
        Self { aws, region }
    }

    fn with_region(&self, mut argv: Vec<String>) -> Vec<String> {
        if let Some(region) = &self.region {
            argv.push("--region".to_string());
            argv.push(region.clone());
        }
        argv
    }

    /// All objects under a prefix (the CLI paginates for us)
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let argv = self.with_region(args([
            "s3api",
            "list-objects-v2",
            "--bucket",
            bucket,
            "--prefix",
            prefix,
            "--output",
            "json",
        ]));
        let out = self.aws.run(&argv).await?.into_result(&argv)?;

        // An empty listing prints nothing at all
        if out.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }

        let response: ListObjectsResponse =
            serde_json::from_str(&out.stdout).map_err(|e| AwsError::UnexpectedOutput {
                command: command_line(&argv),
                reason: e.to_string(),
            })?;
        Ok(response.contents)
    }

    /// Read the restore header and storage class of one object
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObject> {
        let argv = self.with_region(args([
            "s3api",
            "head-object",
            "--bucket",
            bucket,
            "--key",
            key,
            "--output",
            "json",
        ]));
        let out = self.aws.run(&argv).await?.into_result(&argv)?;
        serde_json::from_str(&out.stdout).map_err(|e| {
            AwsError::UnexpectedOutput {
                command: command_line(&argv),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Ask S3 to restore an archived object for `days` days
    pub async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RestoreTier,
    ) -> Result<RestoreRequestOutcome> {
        let request = serde_json::json!({
            "Days": days,
            "GlacierJobParameters": { "Tier": tier.api_name() },
        });
        let argv = self.with_region(args([
            "s3api".to_string(),
            "restore-object".to_string(),
            "--bucket".to_string(),
            bucket.to_string(),
            "--key".to_string(),
            key.to_string(),
            "--restore-request".to_string(),
            request.to_string(),
        ]));
        let out = self.aws.run(&argv).await?;

        if out.success() {
            Ok(RestoreRequestOutcome::Requested)
        } else if out.stderr.contains("RestoreAlreadyInProgress") {
            Ok(RestoreRequestOutcome::AlreadyInProgress)
        } else {
            out.into_result(&argv).map(|_| RestoreRequestOutcome::Requested)
        }
    }

    /// Copy one object to a local file
    pub async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<()> {
        let argv = self.with_region(args([
            "s3".to_string(),
            "cp".to_string(),
            format!("s3://{bucket}/{key}"),
            destination.display().to_string(),
            "--force-glacier-transfer".to_string(),
            "--only-show-errors".to_string(),
        ]));
        self.aws.run(&argv).await?.into_result(&argv)?;
        Ok(())
    }

    /// Upload one local file
    pub async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<()> {
        let argv = self.with_region(args([
            "s3".to_string(),
            "cp".to_string(),
            source.display().to_string(),
            format!("s3://{bucket}/{key}"),
            "--only-show-errors".to_string(),
        ]));
        self.aws.run(&argv).await?.into_result(&argv)?;
        Ok(())
    }

    /// Delete every object in a bucket so CloudFormation can remove it
    pub async fn empty_bucket(&self, bucket: &str) -> Result<()> {
        let argv = self.with_region(args([
            "s3".to_string(),
            "rm".to_string(),
            format!("s3://{bucket}"),
            "--recursive".to_string(),
            "--only-show-errors".to_string(),
        ]));
        self.aws.run(&argv).await?.into_result(&argv)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::{FakeAws, fail, ok};

    #[tokio::test]
    async fn test_list_objects_defaults_storage_class() {
        let aws = FakeAws::new().on(
            &["list-objects-v2"],
            [ok(r#"{"Contents":[
                {"Key":"backups/2024/01/15/db.gz","Size":1024,"StorageClass":"GLACIER"},
                {"Key":"backups/2024/01/15/readme.txt","Size":10}
            ]}"#)],
        );
        let s3 = S3Client::new(&aws, None);

        let objects = s3.list_objects("archive", "backups/2024/01/15/").await.unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects[0].is_archived());
        assert_eq!(objects[1].storage_class, "STANDARD");
        assert!(!objects[1].is_archived());
    }

    #[tokio::test]
    async fn test_empty_listing_prints_nothing() {
        let aws = FakeAws::new().on(&["list-objects-v2"], [ok("")]);
        let s3 = S3Client::new(&aws, Some("us-east-1".to_string()));

        assert!(s3.list_objects("archive", "none/").await.unwrap().is_empty());
        assert!(aws.calls()[0].contains(&"us-east-1".to_string()));
    }

    #[tokio::test]
    async fn test_restore_already_in_progress_is_not_an_error() {
        let aws = FakeAws::new().on(
            &["restore-object"],
            [fail("An error occurred (RestoreAlreadyInProgress) when calling the RestoreObject operation")],
        );
        let s3 = S3Client::new(&aws, None);

        let outcome = s3
            .restore_object("archive", "db.gz", 7, RestoreTier::Bulk)
            .await
            .unwrap();
        assert_eq!(outcome, RestoreRequestOutcome::AlreadyInProgress);

        let request = aws.calls()[0].last().cloned().unwrap();
        assert!(request.contains("\"Tier\":\"Bulk\""));
    }
}
