//! CloudFormation stack status as reported by the control plane.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! stack_statuses {
    ($($variant:ident => $text:literal,)*) => {
        /// Stack status string echoed from CloudFormation.
        ///
        /// Unknown strings are preserved in [`StackStatus::Other`] so nothing
        /// the control plane reports is lost.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum StackStatus {
            /// The stack does not exist
            NotFound,
            $(
                #[allow(missing_docs)]
                $variant,
            )*
            /// Any status this build does not know about
            Other(String),
        }

        impl StackStatus {
            /// Wire representation
            pub fn as_str(&self) -> &str {
                match self {
                    StackStatus::NotFound => "NOT_FOUND",
                    $(StackStatus::$variant => $text,)*
                    StackStatus::Other(s) => s.as_str(),
                }
            }
        }

        impl From<&str> for StackStatus {
            fn from(s: &str) -> Self {
                match s {
                    "NOT_FOUND" => StackStatus::NotFound,
                    $($text => StackStatus::$variant,)*
                    other => StackStatus::Other(other.to_string()),
                }
            }
        }
    };
}

stack_statuses! {
    CreateInProgress => "CREATE_IN_PROGRESS",
    CreateFailed => "CREATE_FAILED",
    CreateComplete => "CREATE_COMPLETE",
    RollbackInProgress => "ROLLBACK_IN_PROGRESS",
    RollbackFailed => "ROLLBACK_FAILED",
    RollbackComplete => "ROLLBACK_COMPLETE",
    DeleteInProgress => "DELETE_IN_PROGRESS",
    DeleteFailed => "DELETE_FAILED",
    DeleteComplete => "DELETE_COMPLETE",
    UpdateInProgress => "UPDATE_IN_PROGRESS",
    UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
    UpdateComplete => "UPDATE_COMPLETE",
    UpdateFailed => "UPDATE_FAILED",
    UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
    UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
    UpdateRollbackCompleteCleanupInProgress => "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
    UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
    ReviewInProgress => "REVIEW_IN_PROGRESS",
    ImportInProgress => "IMPORT_IN_PROGRESS",
    ImportComplete => "IMPORT_COMPLETE",
    ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
    ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
    ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
}

impl StackStatus {
    /// States that need operator intervention; retrying a deploy cannot help
    pub fn is_non_recoverable(&self) -> bool {
        matches!(
            self,
            StackStatus::RollbackFailed
                | StackStatus::DeleteFailed
                | StackStatus::UpdateRollbackFailed
                | StackStatus::ImportRollbackFailed
        )
    }

    /// Stack is absent or fully deleted
    pub fn is_gone(&self) -> bool {
        matches!(self, StackStatus::NotFound | StackStatus::DeleteComplete)
    }

    /// A failed first create leaves the stack in ROLLBACK_COMPLETE, which
    /// cannot be updated; it has to be deleted before the next deploy.
    pub fn requires_replacement(&self) -> bool {
        matches!(self, StackStatus::RollbackComplete)
    }

    /// An operation is still running on the stack
    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }

    /// No further automatic transition will happen
    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    /// Stack exists and its last operation succeeded
    pub fn is_healthy(&self) -> bool {
        matches!(
            self,
            StackStatus::CreateComplete
                | StackStatus::UpdateComplete
                | StackStatus::ImportComplete
        )
    }
}

impl From<String> for StackStatus {
    fn from(s: String) -> Self {
        StackStatus::from(s.as_str())
    }
}

impl From<StackStatus> for String {
    fn from(status: StackStatus) -> Self {
        status.as_str().to_string()
    }
}

impl FromStr for StackStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StackStatus::from(s))
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_statuses_round_trip_text() {
        assert_eq!(StackStatus::from("ROLLBACK_FAILED"), StackStatus::RollbackFailed);
        assert_eq!(StackStatus::from("NOT_FOUND"), StackStatus::NotFound);

        let odd = StackStatus::from("SOMETHING_NEW");
        assert_eq!(odd, StackStatus::Other("SOMETHING_NEW".to_string()));
        assert_eq!(odd.to_string(), "SOMETHING_NEW");
    }

    #[test]
    fn test_non_recoverable_states() {
        assert!(StackStatus::RollbackFailed.is_non_recoverable());
        assert!(StackStatus::DeleteFailed.is_non_recoverable());
        assert!(StackStatus::UpdateRollbackFailed.is_non_recoverable());
        assert!(!StackStatus::RollbackComplete.is_non_recoverable());
        assert!(!StackStatus::UpdateFailed.is_non_recoverable());
    }

    #[test]
    fn test_in_progress_detection() {
        assert!(StackStatus::UpdateCompleteCleanupInProgress.is_in_progress());
        assert!(StackStatus::DeleteInProgress.is_in_progress());
        assert!(StackStatus::CreateComplete.is_terminal());
        assert!(StackStatus::NotFound.is_terminal());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&StackStatus::UpdateComplete).unwrap();
        assert_eq!(json, "\"UPDATE_COMPLETE\"");

        let back: StackStatus = serde_json::from_str("\"DELETE_COMPLETE\"").unwrap();
        assert!(back.is_gone());
    }
}
