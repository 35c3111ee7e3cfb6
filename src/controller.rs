//! Submission and polling controller.
//!
//! [`StudyController`] owns one request at a time and walks it through the
//! state machine below, keeping a progress value the UI can show.
//!
//! ```text
//! Idle ──submit──▶ Submitting ─┬─ { result }  ─▶ Completed (100)
//!                              ├─ { task_id } ─▶ Polling (10) ──poll──┬─▶ Succeeded (100)
//!                              │                  ▲  30 / 50 / 70     └─▶ Failed
//!                              │                  └────────┘
//!                              └─ error ──────▶ Idle (0)
//! ```
//!
//! ## Data Flow
//!
//! 1. **submit** : upload through [`StudyBackend::process_material`]
//! 2. **poll**   : [`StudyController::wait_for_completion`] calls
//!    [`StudyController::poll_once`] every `poll_interval_ms`
//! 3. **fetch**  : [`StudyController::fetch_result`] reads the recent results
//!    and decodes the payload with [`ParsedResult::from_payload`]
//!
//! [`StudyController::process`] runs all three.

use crate::api::{HttpBackend, RecentEntry, RecentResults, StudyBackend};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::result::ParsedResult;
use crate::session::{decode_token, unix_now, Session};
use crate::status::{ControllerState, TaskStatus, ACCEPTED_PROGRESS, COMPLETE_PROGRESS};
use crate::store::{milestone_reached, StateStore};
use crate::upload::ProcessingRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How the backend answered an upload. Produced once per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    /// The backend already had a result for this document.
    CacheHit { result_id: String },
    /// A processing task was started.
    Accepted { task_id: String, result_id: String },
}

impl SubmissionOutcome {
    pub fn result_id(&self) -> &str {
        match self {
            SubmissionOutcome::CacheHit { result_id }
            | SubmissionOutcome::Accepted { result_id, .. } => result_id,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::CacheHit { .. } => None,
            SubmissionOutcome::Accepted { task_id, .. } => Some(task_id),
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, SubmissionOutcome::CacheHit { .. })
    }
}

/// Result of [`StudyController::process`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub submission: SubmissionOutcome,
    pub result: ParsedResult,
    /// Counter value after this request.
    pub documents_processed: u64,
    /// Set when this request brought the counter onto a milestone.
    pub milestone: Option<u64>,
}

/// Drives one request at a time against a [`StudyBackend`].
pub struct StudyController {
    backend: Arc<dyn StudyBackend>,
    config: ClientConfig,
    store: StateStore,
    state: ControllerState,
    progress: u8,
    current_task_id: Option<String>,
    last_failure: Option<String>,
    attempts: u32,
    /// Payload returned inline by a cache hit, keyed by result id.
    cached_result: Option<(String, Value)>,
}

impl std::fmt::Debug for StudyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyController")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("current_task_id", &self.current_task_id)
            .field("last_failure", &self.last_failure)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl StudyController {
    /// Build a controller. A token found in `store` is attached to `backend`.
    pub fn new(backend: Arc<dyn StudyBackend>, config: ClientConfig, store: StateStore) -> Self {
        if let Some(token) = store.access_token() {
            backend.set_token(Some(token.to_string()));
        }
        Self {
            backend,
            config,
            store,
            state: ControllerState::Idle,
            progress: 0,
            current_task_id: None,
            last_failure: None,
            attempts: 0,
            cached_result: None,
        }
    }

    /// Build a controller talking HTTP to `config.base_url`.
    pub fn with_http(config: ClientConfig, store: StateStore) -> Result<Self, ClientError> {
        let backend = HttpBackend::new(&config)?;
        Ok(Self::new(Arc::new(backend), config, store))
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Progress of the current request, `0..=100`.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.current_task_id.as_deref()
    }

    /// Error text the backend gave for the last failed task.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    fn callback(&self) -> ProgressCallback {
        self.config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback))
    }

    /// Forget the current request. Counters and the session are kept.
    pub fn reset(&mut self) {
        self.state = ControllerState::Idle;
        self.progress = 0;
        self.current_task_id = None;
        self.last_failure = None;
        self.attempts = 0;
        self.cached_result = None;
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Upload a validated document.
    ///
    /// A `task_id` in the response wins over an inline `result`. On any error
    /// the controller returns to `Idle` with progress 0.
    pub async fn submit(
        &mut self,
        request: &ProcessingRequest,
    ) -> Result<SubmissionOutcome, ClientError> {
        self.reset();
        self.state = ControllerState::Submitting;
        info!(
            "Submitting '{}' ({} bytes)",
            request.file_name(),
            request.size()
        );

        let response = match self.backend.process_material(request).await {
            Ok(r) => r,
            Err(e) => {
                self.abort_submission(&e);
                return Err(e);
            }
        };

        let result_id = response
            .file_id
            .clone()
            .unwrap_or_else(|| request.file_name().to_string());

        let outcome = if let Some(task_id) = response.task_id {
            self.state = ControllerState::Polling;
            self.progress = ACCEPTED_PROGRESS;
            self.current_task_id = Some(task_id.clone());
            info!("Task {} accepted for '{}'", task_id, result_id);
            SubmissionOutcome::Accepted { task_id, result_id }
        } else if let Some(result) = response.result {
            self.state = ControllerState::Completed;
            self.progress = COMPLETE_PROGRESS;
            self.cached_result = Some((result_id.clone(), result));
            info!("Cached result available for '{}'", result_id);
            SubmissionOutcome::CacheHit { result_id }
        } else {
            let err = ClientError::UnexpectedResponse {
                endpoint: "/process-material/".into(),
                detail: "response has neither a task_id nor a result".into(),
            };
            self.abort_submission(&err);
            return Err(err);
        };

        self.callback().on_submitted(&outcome);
        Ok(outcome)
    }

    fn abort_submission(&mut self, err: &ClientError) {
        warn!("Submission failed: {}", err);
        self.state = ControllerState::Idle;
        self.progress = 0;
        self.callback().on_failed(None, &err.to_string());
    }

    // ── Polling ──────────────────────────────────────────────────────────

    /// Check the task once and update state and progress.
    ///
    /// Never fails: a status request that cannot be completed is logged and
    /// reported as [`TaskStatus::Error`], leaving state and progress as they
    /// were.
    pub async fn poll_once(&mut self, task_id: &str) -> TaskStatus {
        self.attempts += 1;
        let attempt = self.attempts;

        let status = match self.backend.task_status(task_id).await {
            Ok(resp) => {
                let status = TaskStatus::parse(&resp.status);
                if status == TaskStatus::Failure {
                    self.last_failure = resp.error;
                }
                status
            }
            Err(e) => {
                warn!("Status check {} for task {} failed: {}", attempt, task_id, e);
                TaskStatus::Error
            }
        };
        debug!("Task {} check {}: {}", task_id, attempt, status);

        match &status {
            TaskStatus::Success => {
                // Only a task this controller submitted and is still polling counts.
                let owned = self.state == ControllerState::Polling
                    && self.current_task_id.as_deref() == Some(task_id);
                self.state = ControllerState::Succeeded;
                self.progress = COMPLETE_PROGRESS;
                if owned {
                    if let Err(e) = self.store.record_completion() {
                        warn!("Could not save counters: {}", e);
                    }
                }
                info!("Task {} completed", task_id);
            }
            TaskStatus::Failure => {
                self.state = ControllerState::Failed;
                warn!(
                    "Task {} failed: {}",
                    task_id,
                    self.last_failure.as_deref().unwrap_or("no details")
                );
            }
            TaskStatus::Error => {}
            other => {
                if let Some(p) = other.progress_estimate() {
                    self.progress = p;
                }
                self.state = ControllerState::Polling;
            }
        }

        let cb = self.callback();
        cb.on_status(task_id, attempt, &status, self.progress);
        match &status {
            TaskStatus::Success => cb.on_complete(task_id),
            TaskStatus::Failure => cb.on_failed(
                Some(task_id),
                self.last_failure.as_deref().unwrap_or("Failure"),
            ),
            _ => {}
        }
        status
    }

    /// Poll every `poll_interval_ms` until the task is `Success` or `Failure`.
    ///
    /// The first check happens one interval after the call. Returns the
    /// terminal status; stops early with an error when `max_attempts`,
    /// `poll_timeout_secs` or `stop_on_error` say so.
    pub async fn wait_for_completion(&mut self, task_id: &str) -> Result<TaskStatus, ClientError> {
        self.attempts = 0;
        let outcome = match self.config.poll_timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), self.poll_loop(task_id)).await
                {
                    Ok(r) => r,
                    Err(_) => Err(ClientError::PollTimeout {
                        task_id: task_id.to_string(),
                        secs,
                    }),
                }
            }
            None => self.poll_loop(task_id).await,
        };

        if let Err(e) = &outcome {
            warn!("{}", e);
            self.state = ControllerState::Failed;
            self.last_failure = Some(e.to_string());
            self.callback().on_failed(Some(task_id), &e.to_string());
        }
        outcome
    }

    async fn poll_loop(&mut self, task_id: &str) -> Result<TaskStatus, ClientError> {
        let period = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        // Next check is scheduled from when the previous one returned.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let status = self.poll_once(task_id).await;

            if status.is_terminal() {
                return Ok(status);
            }
            if status == TaskStatus::Error && self.config.stop_on_error {
                return Err(ClientError::PollingAborted {
                    task_id: task_id.to_string(),
                });
            }
            if let Some(max) = self.config.max_attempts {
                if self.attempts >= max {
                    return Err(ClientError::PollAttemptsExhausted {
                        task_id: task_id.to_string(),
                        attempts: self.attempts,
                    });
                }
            }
        }
    }

    // ── Results ──────────────────────────────────────────────────────────

    pub async fn recent_results(&self) -> Result<RecentResults, ClientError> {
        self.backend.recent_results().await
    }

    /// Fetch and decode one result.
    pub async fn fetch_result(&self, result_id: &str) -> Result<ParsedResult, ClientError> {
        if let Some((id, payload)) = &self.cached_result {
            if id == result_id {
                return decode_result(result_id, payload);
            }
        }

        let recent = self.backend.recent_results().await?;
        match recent.get(result_id) {
            Some(RecentEntry::Ready(payload)) => decode_result(result_id, payload),
            Some(RecentEntry::Processing { task_id }) => Err(ClientError::ResultStillProcessing {
                result_id: result_id.to_string(),
                task_id: task_id.clone(),
            }),
            Some(RecentEntry::Failed { detail }) => Err(ClientError::TaskFailed {
                task_id: result_id.to_string(),
                detail: detail.clone(),
            }),
            None => Err(ClientError::ResultNotFound {
                result_id: result_id.to_string(),
            }),
        }
    }

    /// Submit, wait for the task if one was started, then fetch the result.
    pub async fn process(
        &mut self,
        request: &ProcessingRequest,
    ) -> Result<ProcessOutcome, ClientError> {
        let submission = self.submit(request).await?;
        let mut milestone = None;

        if let SubmissionOutcome::Accepted { task_id, .. } = &submission {
            let status = self.wait_for_completion(task_id).await?;
            if status == TaskStatus::Failure {
                return Err(ClientError::TaskFailed {
                    task_id: task_id.clone(),
                    detail: self.last_failure.clone(),
                });
            }
            milestone = milestone_reached(self.store.documents_processed());
        }

        let result = self.fetch_result(submission.result_id()).await?;
        Ok(ProcessOutcome {
            submission,
            result,
            documents_processed: self.store.documents_processed(),
            milestone,
        })
    }

    // ── Session ──────────────────────────────────────────────────────────

    /// Log in and keep the token for later runs.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Session, ClientError> {
        let token = self.backend.login(username, password).await?;
        let session = decode_token(&token.access_token)?;
        self.backend.set_token(Some(token.access_token.clone()));
        self.store.set_access_token(Some(token.access_token))?;
        info!("Logged in as {}", session.username);
        Ok(session)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let message = self.backend.register(username, password).await?;
        info!("Registered {}", username);
        Ok(message)
    }

    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.backend.set_token(None);
        self.store.set_access_token(None)
    }

    /// Decode the stored token. Expired or unreadable tokens are removed.
    pub fn restore_session(&mut self) -> Option<Session> {
        self.restore_session_at(unix_now())
    }

    pub fn restore_session_at(&mut self, now_secs: u64) -> Option<Session> {
        let token = self.store.access_token()?.to_string();
        match decode_token(&token) {
            Ok(session) if !session.is_expired_at(now_secs) => {
                self.backend.set_token(Some(token));
                Some(session)
            }
            Ok(session) => {
                info!("Session for {} has expired", session.username);
                self.clear_token();
                None
            }
            Err(e) => {
                warn!("Discarding stored token: {}", e);
                self.clear_token();
                None
            }
        }
    }

    fn clear_token(&mut self) {
        self.backend.set_token(None);
        if let Err(e) = self.store.set_access_token(None) {
            warn!("Could not clear stored token: {}", e);
        }
    }
}

fn decode_result(result_id: &str, payload: &Value) -> Result<ParsedResult, ClientError> {
    ParsedResult::from_payload(payload).ok_or_else(|| ClientError::MalformedResult {
        result_id: result_id.to_string(),
        detail: "the result envelope is not valid JSON".into(),
    })
}
