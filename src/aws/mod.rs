//! Thin layer over the `aws` command line tool.
//!
//! Everything stackpilot does against AWS goes through [`AwsRunner`], which
//! runs one CLI invocation and hands back its exit code and captured output.
//! [`AwsCli`] is the real implementation. Tests script a fake one.

mod cloudformation;
mod s3;

#[cfg(test)]
pub(crate) mod fake;

pub use cloudformation::{StackClient, StackSummary};
pub use s3::{HeadObject, ObjectSummary, RestoreRequestOutcome, S3Client};

use crate::error::{AwsError, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of one CLI invocation
#[derive(Debug, Clone, Default)]
pub struct CliOutput {
    /// Exit code (None when killed by a signal)
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CliOutput {
    /// Whether the process exited zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a non-zero exit into an [`AwsError::CommandFailed`]
    pub fn into_result(self, args: &[String]) -> Result<CliOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(AwsError::CommandFailed {
                command: command_line(args),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            }
            .into())
        }
    }
}

/// Runs `aws` sub-commands.
///
/// A non-zero exit is *not* an error at this level; callers inspect the
/// returned [`CliOutput`] because a failed `describe-stacks` is how a missing
/// stack is reported. `Err` means the process could not run at all or did
/// not finish in time.
pub trait AwsRunner: Sync {
    /// Run `aws <args...>`
    fn run(&self, args: &[String]) -> impl Future<Output = Result<CliOutput>> + Send;
}

/// Render an argument vector the way a user would type it
pub fn command_line(args: &[String]) -> String {
    let mut line = String::from("aws");
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Build an owned argument vector from string slices
pub fn args<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

/// Real runner backed by the installed `aws` binary
#[derive(Debug, Clone)]
pub struct AwsCli {
    binary: PathBuf,
    profile: Option<String>,
    call_timeout: Duration,
}

impl AwsCli {
    /// Locate the aws binary, either at an explicit path or on PATH
    pub fn locate(
        explicit: Option<&Path>,
        profile: Option<String>,
        call_timeout: Duration,
    ) -> Result<Self> {
        let binary = match explicit {
            Some(path) if path.exists() => path.to_path_buf(),
            Some(path) => {
                return Err(AwsError::NotInstalled {
                    reason: format!("{} does not exist", path.display()),
                }
                .into());
            }
            None => which::which("aws").map_err(|e| AwsError::NotInstalled {
                reason: format!("`aws` not found on PATH: {e}"),
            })?,
        };

        log::debug!("Using AWS CLI at {}", binary.display());

        Ok(Self {
            binary,
            profile,
            call_timeout,
        })
    }

    fn full_args(&self, args: &[String]) -> Vec<String> {
        let mut full = args.to_vec();
        if let Some(profile) = &self.profile {
            full.push("--profile".to_string());
            full.push(profile.clone());
        }
        full.push("--no-cli-pager".to_string());
        full
    }
}

impl AwsRunner for AwsCli {
    fn run(&self, args: &[String]) -> impl Future<Output = Result<CliOutput>> + Send {
        let full = self.full_args(args);
        let display = command_line(args);
        let binary = self.binary.clone();
        let call_timeout = self.call_timeout;

        async move {
            log::debug!("+ {display}");

            let child = Command::new(&binary)
                .args(&full)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| AwsError::NotInstalled {
                    reason: format!("failed to start {}: {e}", binary.display()),
                })?;

            let output = match timeout(call_timeout, child.wait_with_output()).await {
                Err(_) => {
                    return Err(AwsError::TimedOut {
                        command: display,
                        seconds: call_timeout.as_secs(),
                    }
                    .into());
                }
                Ok(result) => result?,
            };

            let result = CliOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };

            if !result.success() {
                log::debug!(
                    "{display} exited with {:?}: {}",
                    result.exit_code,
                    result.stderr.trim()
                );
            }

            Ok(result)
        }
    }
}
