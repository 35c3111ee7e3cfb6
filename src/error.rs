//! Error types for the studybuddy-client library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ClientError`]: **Fatal** for one operation: the file was rejected,
//!   the backend could not be reached, the task failed, or the persisted
//!   state could not be written. Returned as `Err(ClientError)` from the
//!   controller, the backend client and the session helpers.
//!
//! * [`PayloadError`]: **Non-fatal**: one piece of model output could not be
//!   decoded. The tolerant parser logs it and degrades that field to `None`
//!   so the rest of the result is still shown.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the studybuddy-client library.
///
/// Parse failures of model output use [`PayloadError`] and never surface
/// here; a whole result that cannot be decoded is [`ClientError::MalformedResult`].
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Validation errors ────────────────────────────────────────────────
    /// The file to upload does not exist.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is not of the accepted type.
    #[error("Only PDF files are supported: '{name}' looks like {detected}")]
    UnsupportedFileType { name: String, detected: String },

    /// The file exceeds the upload limit.
    #[error("'{name}' is {size} bytes; the maximum upload size is {max} bytes")]
    FileTooLarge { name: String, size: u64, max: u64 },

    /// The file is empty.
    #[error("'{name}' is empty")]
    EmptyFile { name: String },

    // ── Transport errors ─────────────────────────────────────────────────
    /// The request could not be sent or the response could not be read.
    #[error("Request to {endpoint} failed: {reason}\nIs the StudyBuddy backend running?")]
    Request { endpoint: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Request to {endpoint} timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    // ── Backend errors ───────────────────────────────────────────────────
    /// The backend answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {detail}")]
    Http {
        endpoint: String,
        status: u16,
        detail: String,
    },

    /// The backend rejected the credentials or the bearer token (401).
    #[error("Not authorised: {detail}\nLog in again with `studybuddy login`.")]
    Unauthorized { detail: String },

    /// The backend answered 2xx with a body of an unexpected shape.
    #[error("Unexpected response from {endpoint}: {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },

    // ── Processing flow errors ───────────────────────────────────────────
    /// The backend reported the task as failed.
    #[error("Processing task {task_id} failed{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    TaskFailed {
        task_id: String,
        detail: Option<String>,
    },

    /// Polling stopped after the configured number of status checks.
    #[error("Task {task_id} still not finished after {attempts} status checks")]
    PollAttemptsExhausted { task_id: String, attempts: u32 },

    /// Polling stopped after the configured wall-clock limit.
    #[error("Task {task_id} still not finished after {secs}s")]
    PollTimeout { task_id: String, secs: u64 },

    /// A status check failed and `stop_on_error` is enabled.
    #[error("Status check for task {task_id} failed; polling stopped")]
    PollingAborted { task_id: String },

    /// No recent result is stored under this identifier.
    #[error("No result found for '{result_id}'. It may have been removed.")]
    ResultNotFound { result_id: String },

    /// The result exists but its task has not finished yet.
    #[error("'{result_id}' is still being processed (task {task_id})")]
    ResultStillProcessing { result_id: String, task_id: String },

    /// The stored result could not be decoded at all.
    #[error("Result '{result_id}' could not be decoded: {detail}")]
    MalformedResult { result_id: String, detail: String },

    // ── Session errors ───────────────────────────────────────────────────
    /// The operation needs a login.
    #[error("Not logged in.\nRun `studybuddy login` first.")]
    NotAuthenticated,

    /// The stored access token could not be decoded.
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    // ── Persisted state errors ───────────────────────────────────────────
    /// The state file could not be read or written.
    #[error("Failed to access state file '{path}': {source}")]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not valid.
    #[error("State file '{path}' is corrupt: {detail}\nDelete it to start over.")]
    StateCorrupt { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// True for failures that a later retry of the same call may fix.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request { .. } | ClientError::Timeout { .. } => true,
            ClientError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// A non-fatal decoding failure for one piece of model output.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PayloadError {
    /// Nothing left to parse after trimming and fence removal.
    #[error("payload is empty")]
    Empty,

    /// The (possibly repaired) text is still not valid JSON.
    #[error("invalid JSON at line {line}, column {column}: {detail}")]
    Syntax {
        line: usize,
        column: usize,
        detail: String,
    },

    /// Valid JSON, but not the structure this field needs.
    #[error("field '{field}': {detail}")]
    Shape { field: String, detail: String },
}

impl From<serde_json::Error> for PayloadError {
    fn from(e: serde_json::Error) -> Self {
        PayloadError::Syntax {
            line: e.line(),
            column: e.column(),
            detail: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_failed_display_with_detail() {
        let e = ClientError::TaskFailed {
            task_id: "abc".into(),
            detail: Some("crew crashed".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("abc"), "got: {msg}");
        assert!(msg.contains("crew crashed"), "got: {msg}");
    }

    #[test]
    fn task_failed_display_without_detail() {
        let e = ClientError::TaskFailed {
            task_id: "abc".into(),
            detail: None,
        };
        assert_eq!(e.to_string(), "Processing task abc failed");
    }

    #[test]
    fn file_too_large_display() {
        let e = ClientError::FileTooLarge {
            name: "big.pdf".into(),
            size: 20,
            max: 10,
        };
        assert!(e.to_string().contains("big.pdf"));
        assert!(e.to_string().contains("10 bytes"));
    }

    #[test]
    fn transient_classification() {
        let timeout = ClientError::Timeout {
            endpoint: "/task-status/x".into(),
            secs: 5,
        };
        assert!(timeout.is_transient());

        let server = ClientError::Http {
            endpoint: "/recent-results/".into(),
            status: 503,
            detail: "busy".into(),
        };
        assert!(server.is_transient());

        let client = ClientError::Http {
            endpoint: "/recent-results/".into(),
            status: 404,
            detail: "nope".into(),
        };
        assert!(!client.is_transient());
        assert!(!ClientError::NotAuthenticated.is_transient());
    }

    #[test]
    fn payload_error_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\":").unwrap_err();
        match PayloadError::from(err) {
            PayloadError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
