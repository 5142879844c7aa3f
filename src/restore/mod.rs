//! Glacier restore job tracking.
//!
//! A job is created by listing archived objects under a dated prefix and
//! requesting a restore for each. The job record is persisted through
//! [`crate::state::JobStore`] and is all that later `status` and `download`
//! calls need besides the job id.

mod job;
mod tier;
mod tracker;

pub use job::{JOB_FORMAT_VERSION, JobProgress, RestoreJob, RestoreState, TrackedObject, generate_job_id};
pub use tier::{BYTES_PER_GB, CostEstimate, RestoreTier};
pub use tracker::{
    CandidateQuery, CandidateSet, DEFAULT_BASE_PREFIX, DEFAULT_DATE_FORMAT, DownloadReport,
    RestoreTracker, validate_bucket_name,
};
