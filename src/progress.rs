//! Progress-callback trait for submission and polling events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to follow a
//! request as the controller submits it and polls its task. The CLI uses it
//! to drive its progress bar; a GUI could forward the same events to a view.
//!
//! # Example
//!
//! ```rust
//! use studybuddy_client::{ClientConfig, ProcessingProgressCallback, TaskStatus};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct LastProgress(AtomicU8);
//!
//! impl ProcessingProgressCallback for LastProgress {
//!     fn on_status(&self, _task_id: &str, _attempt: u32, _status: &TaskStatus, progress: u8) {
//!         self.0.store(progress, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(Arc::new(LastProgress(AtomicU8::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::controller::SubmissionOutcome;
use crate::status::TaskStatus;
use std::sync::Arc;

/// Called by [`crate::StudyController`] as a request moves through its states.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called once the backend has answered the upload.
    fn on_submitted(&self, outcome: &SubmissionOutcome) {
        let _ = outcome;
    }

    /// Called after every status check.
    ///
    /// # Arguments
    /// * `task_id` : the task being polled
    /// * `attempt` : 1-based index of this check
    /// * `status`  : what the backend reported (or `Error`)
    /// * `progress`: the controller's progress value after this check
    fn on_status(&self, task_id: &str, attempt: u32, status: &TaskStatus, progress: u8) {
        let _ = (task_id, attempt, status, progress);
    }

    /// Called when the task reached `Success`.
    fn on_complete(&self, task_id: &str) {
        let _ = task_id;
    }

    /// Called when submission or the task failed.
    fn on_failed(&self, task_id: Option<&str>, reason: &str) {
        let _ = (task_id, reason);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        statuses: Mutex<Vec<(u32, TaskStatus, u8)>>,
        failures: AtomicUsize,
    }

    impl ProcessingProgressCallback for Recording {
        fn on_status(&self, _task_id: &str, attempt: u32, status: &TaskStatus, progress: u8) {
            self.statuses
                .lock()
                .unwrap()
                .push((attempt, status.clone(), progress));
        }

        fn on_failed(&self, _task_id: Option<&str>, _reason: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_submitted(&SubmissionOutcome::CacheHit {
            result_id: "notes.pdf".into(),
        });
        cb.on_status("t", 1, &TaskStatus::Pending, 30);
        cb.on_complete("t");
        cb.on_failed(None, "boom");
    }

    #[test]
    fn recording_callback_receives_events() {
        let cb = Recording::default();
        cb.on_status("t", 1, &TaskStatus::Pending, 30);
        cb.on_status("t", 2, &TaskStatus::Started, 70);
        cb.on_failed(Some("t"), "Failure");

        let seen = cb.statuses.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], (2, TaskStatus::Started, 70));
        assert_eq!(cb.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_status("t", 1, &TaskStatus::Progress, 50);
    }
}
