//! Task and controller state types.
//!
//! The backend reports Celery task states as loosely-cased strings
//! (`"Pending"`, `"STARTED"`, `"PROGRESS"`, `"Success"`, `"Failure"`).
//! [`TaskStatus`] normalises them; anything else is kept verbatim in
//! [`TaskStatus::Unknown`] so it can still be logged and shown.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress shown for statuses that carry no estimate of their own.
pub const DEFAULT_PROGRESS: u8 = 30;

/// Progress set when a task has been accepted but not yet polled.
pub const ACCEPTED_PROGRESS: u8 = 10;

/// Progress of a finished request.
pub const COMPLETE_PROGRESS: u8 = 100;

/// Status of one backend processing task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Started,
    Progress,
    Success,
    Failure,
    /// Synthetic: the status request itself failed.
    Error,
    /// A status string this client does not know.
    Unknown(String),
}

impl TaskStatus {
    /// Parse a wire status string, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => TaskStatus::Pending,
            "started" => TaskStatus::Started,
            "progress" => TaskStatus::Progress,
            "success" => TaskStatus::Success,
            "failure" => TaskStatus::Failure,
            "error" => TaskStatus::Error,
            _ => TaskStatus::Unknown(raw.to_string()),
        }
    }

    /// Terminal statuses end polling. `Error` is not terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }

    /// Fixed progress estimate for a non-terminal status.
    ///
    /// These are markers, not measurements: the backend does not report a
    /// percentage. Terminal and synthetic statuses return `None` because the
    /// controller handles them separately.
    pub fn progress_estimate(&self) -> Option<u8> {
        match self {
            TaskStatus::Pending => Some(30),
            TaskStatus::Progress => Some(50),
            TaskStatus::Started => Some(70),
            TaskStatus::Unknown(_) => Some(DEFAULT_PROGRESS),
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Error => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Started => "Started",
            TaskStatus::Progress => "Progress",
            TaskStatus::Success => "Success",
            TaskStatus::Failure => "Failure",
            TaskStatus::Error => "Error",
            TaskStatus::Unknown(s) => s,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the controller is in the life of one request.
///
/// ```text
/// Idle ─▶ Submitting ─┬─▶ Completed            (cache hit)
///                     └─▶ Polling ─┬─▶ Succeeded
///                                  └─▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllerState {
    #[default]
    Idle,
    Submitting,
    /// The backend already had the result (cache hit).
    Completed,
    Polling,
    Succeeded,
    Failed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Idle => "idle",
            ControllerState::Submitting => "submitting",
            ControllerState::Completed => "completed",
            ControllerState::Polling => "polling",
            ControllerState::Succeeded => "succeeded",
            ControllerState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_spellings() {
        assert_eq!(TaskStatus::parse("Pending"), TaskStatus::Pending);
        assert_eq!(TaskStatus::parse("PENDING"), TaskStatus::Pending);
        assert_eq!(TaskStatus::parse("STARTED"), TaskStatus::Started);
        assert_eq!(TaskStatus::parse("PROGRESS"), TaskStatus::Progress);
        assert_eq!(TaskStatus::parse("Success"), TaskStatus::Success);
        assert_eq!(TaskStatus::parse("Failure"), TaskStatus::Failure);
        assert_eq!(
            TaskStatus::parse("RETRY"),
            TaskStatus::Unknown("RETRY".into())
        );
    }

    #[test]
    fn progress_table() {
        assert_eq!(TaskStatus::Pending.progress_estimate(), Some(30));
        assert_eq!(TaskStatus::Progress.progress_estimate(), Some(50));
        assert_eq!(TaskStatus::Started.progress_estimate(), Some(70));
        assert_eq!(
            TaskStatus::parse("UNKNOWN").progress_estimate(),
            Some(DEFAULT_PROGRESS)
        );
        assert_eq!(TaskStatus::Success.progress_estimate(), None);
        assert_eq!(TaskStatus::Error.progress_estimate(), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failure.is_terminal());
        assert!(!TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn unknown_status_displays_raw_string() {
        assert_eq!(TaskStatus::parse("REVOKED").to_string(), "REVOKED");
    }

    #[test]
    fn controller_state_display() {
        assert_eq!(ControllerState::default().to_string(), "idle");
        assert_eq!(ControllerState::Succeeded.to_string(), "succeeded");
    }
}
