//! Error types for stackpilot operations.
//!
//! Errors fall into three classes: transient remote failures (retried),
//! non-recoverable remote states (fatal at once) and local precondition
//! failures (fatal at once, with a descriptive message).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stackpilot operations
pub type Result<T> = std::result::Result<T, OpsError>;

/// Main error type for all stackpilot operations
#[derive(Error, Debug)]
pub enum OpsError {
    /// AWS CLI invocation errors
    #[error("AWS CLI error: {0}")]
    Aws(#[from] AwsError),

    /// Stack deploy/teardown errors
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Glacier restore errors
    #[error("Restore error: {0}")]
    Restore(#[from] RestoreError),

    /// Deployment plan errors
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Job record persistence errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Failures talking to the `aws` binary itself
#[derive(Error, Debug)]
pub enum AwsError {
    /// The aws binary could not be found or started
    #[error("AWS CLI not available: {reason}")]
    NotInstalled {
        /// Reason for the error
        reason: String,
    },

    /// The command ran and exited non-zero
    #[error("`{command}` exited with code {exit_code:?}: {stderr}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Process exit code, if any
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The command did not finish within the per-call timeout
    #[error("`{command}` timed out after {seconds}s")]
    TimedOut {
        /// Command line that timed out
        command: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// The command succeeded but its output could not be understood
    #[error("Unexpected output from `{command}`: {reason}")]
    UnexpectedOutput {
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },
}

/// Stack deployment and teardown errors
#[derive(Error, Debug)]
pub enum StackError {
    /// Stack is in a state the control plane will not move out of on its own
    #[error("Stack '{stack}' is in non-recoverable state {status}")]
    NonRecoverableState {
        /// Stack name
        stack: String,
        /// Reported status
        status: String,
        /// Deploy calls made before giving up
        attempts: u32,
    },

    /// Every allowed attempt failed with a transient error
    #[error("Deploy of '{stack}' failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        /// Stack name
        stack: String,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        last_error: String,
    },

    /// Stack ended in DELETE_FAILED
    #[error("Delete of '{stack}' failed with status {status}")]
    DeleteFailed {
        /// Stack name
        stack: String,
        /// Reported status
        status: String,
    },

    /// Stack did not reach a terminal state before the wall-clock budget ran out
    #[error("Delete of '{stack}' timed out after {elapsed_secs}s (last status {last_status})")]
    DeleteTimedOut {
        /// Stack name
        stack: String,
        /// Seconds waited
        elapsed_secs: u64,
        /// Last status observed
        last_status: String,
    },

    /// Stack name rejected by CloudFormation naming rules
    #[error("Invalid stack name '{name}': must start with a letter and contain only letters, digits and hyphens (max 128)")]
    InvalidName {
        /// Offending name
        name: String,
    },

    /// Template file missing on disk
    #[error("Template file not found: {path}")]
    TemplateNotFound {
        /// Path where the template was expected
        path: PathBuf,
    },
}

/// Glacier restore errors
#[derive(Error, Debug)]
pub enum RestoreError {
    /// Date argument could not be parsed
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate {
        /// Input value
        value: String,
    },

    /// Bucket name rejected by S3 naming rules
    #[error("Invalid bucket name '{name}'")]
    InvalidBucketName {
        /// Offending name
        name: String,
    },

    /// Unknown retrieval tier
    #[error("Unknown restore tier '{value}': expected expedited, standard or bulk")]
    UnknownTier {
        /// Input value
        value: String,
    },

    /// Nothing archived under the prefix
    #[error("No archived objects found in s3://{bucket}/{prefix}")]
    NoCandidates {
        /// Bucket name
        bucket: String,
        /// Key prefix
        prefix: String,
    },

    /// Retrieval tier not offered for the object's storage class
    #[error("Tier {tier} is not available for {storage_class} object '{key}'")]
    TierNotSupported {
        /// Object key
        key: String,
        /// Requested tier
        tier: String,
        /// Object storage class
        storage_class: String,
    },

    /// Restore request rejected for one object
    #[error("Restore request for '{key}' failed: {reason}")]
    RequestFailed {
        /// Object key
        key: String,
        /// Reason for the error
        reason: String,
    },

    /// Object key would escape the destination directory
    #[error("Refusing to download '{key}': key is not a relative path")]
    UnsafeKey {
        /// Object key
        key: String,
    },
}

/// Deployment plan errors
#[derive(Error, Debug)]
pub enum PlanError {
    /// Plan file missing
    #[error("Plan file not found: {path}")]
    NotFound {
        /// Expected path
        path: PathBuf,
    },

    /// Plan file failed to parse
    #[error("Failed to parse plan {path}: {reason}")]
    Parse {
        /// Plan path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Two stacks share a component name
    #[error("Component '{component}' is declared more than once")]
    DuplicateComponent {
        /// Component name
        component: String,
    },

    /// Component selector names something the plan does not declare
    #[error("Unknown component '{component}' (available: {available:?})")]
    UnknownComponent {
        /// Requested component
        component: String,
        /// Declared components
        available: Vec<String>,
    },

    /// depends_on references a missing component
    #[error("Component '{component}' depends on undeclared component '{dependency}'")]
    UnknownDependency {
        /// Component name
        component: String,
        /// Missing dependency
        dependency: String,
    },

    /// depends_on forms a cycle
    #[error("Circular dependency detected involving component '{component}'")]
    CircularDependency {
        /// A component on the cycle
        component: String,
    },

    /// A placeholder could not be resolved
    #[error("Missing required parameter for '{component}': {reason}")]
    MissingParameter {
        /// Component name
        component: String,
        /// Reason for the error
        reason: String,
    },
}

/// Job record persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    /// Job file corrupted
    #[error("Job file corrupted: {reason}")]
    Corrupted {
        /// Reason for the error
        reason: String,
    },

    /// No job with this id
    #[error("Restore job '{job_id}' not found")]
    NotFound {
        /// Job identifier
        job_id: String,
    },

    /// Job id contains characters that cannot be used as a file name
    #[error("Invalid job id '{job_id}'")]
    InvalidJobId {
        /// Job identifier
        job_id: String,
    },

    /// Job format version mismatch
    #[error("Job file version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Found version
        found: String,
    },

    /// Failed to save a record
    #[error("Failed to save state: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },

    /// Failed to load a record
    #[error("Failed to load state: {reason}")]
    LoadFailed {
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },
}

impl OpsError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            OpsError::Aws(AwsError::NotInstalled { .. }) => vec![
                "Install the AWS CLI v2: https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html".to_string(),
                "Or point --aws-bin at an existing aws binary".to_string(),
            ],
            OpsError::Aws(AwsError::CommandFailed { stderr, .. })
                if stderr.contains("ExpiredToken") || stderr.contains("Unable to locate credentials") =>
            {
                vec![
                    "Refresh credentials: aws sso login (or export new keys)".to_string(),
                    "Check the active profile with: aws sts get-caller-identity".to_string(),
                ]
            }
            OpsError::Stack(StackError::NonRecoverableState { stack, .. }) => vec![
                format!("Inspect failed resources: aws cloudformation describe-stack-events --stack-name {stack}"),
                format!("Delete the stack manually (retaining stuck resources if needed): aws cloudformation delete-stack --stack-name {stack}"),
            ],
            OpsError::Stack(StackError::RetriesExhausted { .. }) => vec![
                "Raise --max-retries or --retry-delay if the control plane is throttling".to_string(),
                "Run `stackpilot status` to see where the stack ended up".to_string(),
            ],
            OpsError::Stack(StackError::DeleteTimedOut { stack, .. }) => vec![
                format!("Deletion may still be running; check: aws cloudformation describe-stacks --stack-name {stack}"),
                "Re-run teardown with a larger --timeout".to_string(),
            ],
            OpsError::Stack(StackError::TemplateNotFound { .. }) => vec![
                "Template paths are resolved relative to the plan file".to_string(),
            ],
            OpsError::Restore(RestoreError::NoCandidates { .. }) => vec![
                "Check --prefix and --date-format against the bucket layout: aws s3 ls s3://<bucket>/".to_string(),
            ],
            OpsError::Restore(RestoreError::TierNotSupported { .. }) => vec![
                "DEEP_ARCHIVE objects can only be restored with the standard or bulk tier".to_string(),
            ],
            OpsError::State(StateError::NotFound { .. }) => vec![
                "List tracked jobs with: stackpilot restore jobs".to_string(),
                "Make sure --state-dir matches the one used at initiate time".to_string(),
            ],
            OpsError::Plan(PlanError::CircularDependency { .. }) => vec![
                "Remove the cycle from depends_on in the plan file".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Deploy calls made before a deploy gave up, when the error records it
    pub fn deploy_attempts(&self) -> Option<u32> {
        match self {
            OpsError::Stack(
                StackError::RetriesExhausted { attempts, .. }
                | StackError::NonRecoverableState { attempts, .. },
            ) => Some(*attempts),
            _ => None,
        }
    }

    /// Check if this error is transient and worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OpsError::Aws(AwsError::CommandFailed { .. }) | OpsError::Aws(AwsError::TimedOut { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_remote_failures_are_recoverable() {
        let transient = OpsError::Aws(AwsError::TimedOut {
            command: "aws cloudformation deploy".to_string(),
            seconds: 30,
        });
        assert!(transient.is_recoverable());

        let fatal = OpsError::Stack(StackError::NonRecoverableState {
            stack: "app-dev-network".to_string(),
            status: "ROLLBACK_FAILED".to_string(),
            attempts: 1,
        });
        assert!(!fatal.is_recoverable());
        assert_eq!(fatal.deploy_attempts(), Some(1));

        let precondition = OpsError::Stack(StackError::TemplateNotFound {
            path: PathBuf::from("missing.yaml"),
        });
        assert!(!precondition.is_recoverable());
    }

    #[test]
    fn test_credential_failures_get_specific_suggestions() {
        let err = OpsError::Aws(AwsError::CommandFailed {
            command: "aws s3api head-object".to_string(),
            exit_code: Some(255),
            stderr: "Unable to locate credentials".to_string(),
        });
        let suggestions = err.recovery_suggestions();
        assert!(suggestions.iter().any(|s| s.contains("sts get-caller-identity")));
    }
}
