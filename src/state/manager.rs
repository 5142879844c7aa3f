//! On-disk persistence for restore job records.
//!
//! One pretty-printed JSON file per job, written atomically (temp file,
//! fsync, rename) so a crash never leaves a half-written record.

use crate::error::{Result, StateError};
use crate::restore::RestoreJob;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("job id regex is valid"));

/// Directory of restore job records
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs_dir: PathBuf,
}

impl JobStore {
    /// Store rooted at `<state_dir>/restore-jobs`
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            jobs_dir: state_dir.as_ref().join("restore-jobs"),
        }
    }

    /// Directory holding the records
    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Path of one job's record
    pub fn job_path(&self, job_id: &str) -> Result<PathBuf> {
        if !JOB_ID_RE.is_match(job_id) {
            return Err(StateError::InvalidJobId {
                job_id: job_id.to_string(),
            }
            .into());
        }
        Ok(self.jobs_dir.join(format!("{job_id}.json")))
    }

    /// Whether a record exists
    pub fn exists(&self, job_id: &str) -> bool {
        self.job_path(job_id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Write a record, stamping `updated_at`
    pub fn save(&self, job: &mut RestoreJob) -> Result<PathBuf> {
        job.validate()?;
        job.updated_at = chrono::Utc::now();

        let path = self.job_path(&job.job_id)?;
        let serialized = serde_json::to_string_pretty(job).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to serialize job: {e}"),
        })?;
        write_atomic(&path, serialized.as_bytes())?;

        log::debug!("Saved restore job {} to {}", job.job_id, path.display());
        Ok(path)
    }

    /// Load a record by id
    pub fn load(&self, job_id: &str) -> Result<RestoreJob> {
        let path = self.job_path(job_id)?;
        if !path.exists() {
            return Err(StateError::NotFound {
                job_id: job_id.to_string(),
            }
            .into());
        }

        let job = read_job(&path)?;
        job.validate()?;
        Ok(job)
    }

    /// All readable records, newest first. Unreadable files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<RestoreJob>> {
        if !self.jobs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.jobs_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_job(&path) {
                Ok(job) => jobs.push(job),
                Err(e) => log::warn!("Skipping unreadable job file {}: {e}", path.display()),
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Delete one record
    pub fn remove(&self, job_id: &str) -> Result<()> {
        let path = self.job_path(job_id)?;
        if !path.exists() {
            return Err(StateError::NotFound {
                job_id: job_id.to_string(),
            }
            .into());
        }
        fs::remove_file(&path).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to remove {}: {e}", path.display()),
        })?;
        Ok(())
    }

    /// Delete every record file, readable or not; returns how many were removed
    pub fn remove_all(&self) -> Result<usize> {
        if !self.jobs_dir.exists() {
            return Ok(0);
        }

        let mut errors = Vec::new();
        let mut removed = 0;

        for entry in fs::read_dir(&self.jobs_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => errors.push(format!("{}: {e}", path.display())),
            }
        }

        if !errors.is_empty() {
            return Err(StateError::SaveFailed {
                reason: format!("Cleanup errors: {}", errors.join("; ")),
            }
            .into());
        }
        Ok(removed)
    }
}

fn read_job(path: &Path) -> Result<RestoreJob> {
    let contents = fs::read_to_string(path).map_err(|e| StateError::LoadFailed {
        reason: format!("Failed to read {}: {e}", path.display()),
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        StateError::Corrupted {
            reason: format!("Failed to deserialize {}: {e}", path.display()),
        }
        .into()
    })
}

/// Write `bytes` to `path` via a temp file and rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to create {}: {e}", parent.display()),
        })?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to create temp file: {e}"),
        })?;
        file.write_all(bytes).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to write state: {e}"),
        })?;
        file.sync_all().map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to sync file: {e}"),
        })?;
    }

    fs::rename(&temp_path, path).map_err(|e| StateError::SaveFailed {
        reason: format!("Failed to rename temp file: {e}"),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::RestoreTier;

    #[test]
    fn test_rejects_path_like_job_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        assert!(store.job_path("../etc/passwd").is_err());
        assert!(store.job_path("restore-20240101-000000-abcd1234").is_ok());
    }

    #[test]
    fn test_corrupted_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        fs::create_dir_all(store.jobs_dir()).unwrap();
        fs::write(store.jobs_dir().join("broken.json"), "{ not json").unwrap();

        assert!(store.load("broken").is_err());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_all_includes_corrupted_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let mut job = RestoreJob::new("archive", "p/", RestoreTier::Bulk, 1, &[]);
        store.save(&mut job).unwrap();
        fs::write(store.jobs_dir().join("broken.json"), "{ not json").unwrap();
        fs::write(store.jobs_dir().join("notes.txt"), "keep me").unwrap();

        assert_eq!(store.remove_all().unwrap(), 2);
        assert!(!store.jobs_dir().join("broken.json").exists());
        assert!(store.jobs_dir().join("notes.txt").exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_all_counts_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        for _ in 0..3 {
            let mut job = RestoreJob::new("archive", "p/", RestoreTier::Bulk, 1, &[]);
            store.save(&mut job).unwrap();
        }

        assert_eq!(store.remove_all().unwrap(), 3);
        assert!(store.list().unwrap().is_empty());
    }
}
