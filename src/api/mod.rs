//! Backend contract.
//!
//! The controller talks to the backend only through [`StudyBackend`], so the
//! HTTP client ([`HttpBackend`]) can be swapped for a scripted fake in tests.
//!
//! ## Endpoints
//!
//! ```text
//! POST /process-material/      multipart `file`  → { result } | { task_id, file_id? }
//! GET  /task-status/{task_id}                    → { status, error? }
//! GET  /recent-results/                          → { id: raw } | [ { filename, result | task_id } ]
//! POST /token/                 form              → { access_token, token_type }
//! POST /register/              query             → { message }
//! ```

pub mod http;

use crate::error::ClientError;
use crate::upload::ProcessingRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpBackend;

/// Operations the StudyBuddy backend offers.
#[async_trait]
pub trait StudyBackend: Send + Sync {
    /// Upload a document for processing.
    async fn process_material(
        &self,
        request: &ProcessingRequest,
    ) -> Result<SubmitResponse, ClientError>;

    /// Read the status of one task.
    async fn task_status(&self, task_id: &str) -> Result<StatusResponse, ClientError>;

    /// List the user's recent results.
    async fn recent_results(&self) -> Result<RecentResults, ClientError>;

    /// Exchange credentials for an access token.
    async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ClientError>;

    /// Create an account. Returns the backend's message.
    async fn register(&self, username: &str, password: &str) -> Result<String, ClientError>;

    /// Attach (or clear) the bearer token sent with every request.
    fn set_token(&self, token: Option<String>) {
        let _ = token;
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Body of `POST /process-material/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub message: Option<String>,
    /// Present on a cache hit.
    #[serde(default)]
    pub result: Option<Value>,
    /// Present when a background task was started.
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
}

/// Body of `GET /task-status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /token/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

// ── Recent results ───────────────────────────────────────────────────────

/// State of one recent result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecentEntry {
    /// Finished; holds the raw payload (string or decoded object).
    Ready(Value),
    /// Still being processed by this task.
    Processing { task_id: String },
    /// The backend recorded a failure for this document.
    Failed { detail: Option<String> },
}

impl RecentEntry {
    pub fn label(&self) -> &'static str {
        match self {
            RecentEntry::Ready(_) => "ready",
            RecentEntry::Processing { .. } => "processing",
            RecentEntry::Failed { .. } => "failed",
        }
    }

    fn from_item(item: &Value) -> Self {
        let Some(obj) = item.as_object() else {
            return RecentEntry::Ready(item.clone());
        };
        if let Some(result) = obj.get("result").filter(|v| !v.is_null()) {
            return RecentEntry::Ready(result.clone());
        }
        if let Some(detail) = obj.get("error").filter(|v| !v.is_null()) {
            return RecentEntry::Failed {
                detail: Some(detail.as_str().map_or_else(|| detail.to_string(), str::to_string)),
            };
        }
        match obj.get("task_id").and_then(Value::as_str) {
            Some(task_id) => RecentEntry::Processing {
                task_id: task_id.to_string(),
            },
            // An object with none of the markers is itself a decoded envelope.
            None => RecentEntry::Ready(item.clone()),
        }
    }
}

/// Recent results in the order the backend listed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentResults {
    entries: Vec<(String, RecentEntry)>,
}

impl RecentResults {
    pub fn new(entries: Vec<(String, RecentEntry)>) -> Self {
        Self { entries }
    }

    /// Accept either backend shape: an object keyed by result id, or a list
    /// of `{ filename, result | task_id }` items.
    pub fn from_value(value: Value) -> Result<Self, ClientError> {
        match value {
            Value::Object(map) => Ok(Self::new(
                map.into_iter()
                    .map(|(id, v)| {
                        let entry = RecentEntry::from_item(&v);
                        (id, entry)
                    })
                    .collect(),
            )),
            Value::Array(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let id = ["filename", "file_id", "id"]
                        .iter()
                        .find_map(|k| item.get(k).and_then(Value::as_str))
                        .ok_or_else(|| ClientError::UnexpectedResponse {
                            endpoint: "/recent-results/".into(),
                            detail: format!("item {i} has no filename"),
                        })?;
                    entries.push((id.to_string(), RecentEntry::from_item(item)));
                }
                Ok(Self::new(entries))
            }
            other => Err(ClientError::UnexpectedResponse {
                endpoint: "/recent-results/".into(),
                detail: format!("expected an object or a list, got {other}"),
            }),
        }
    }

    pub fn get(&self, result_id: &str) -> Option<&RecentEntry> {
        self.entries
            .iter()
            .find(|(id, _)| id == result_id)
            .map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecentEntry)> {
        self.entries.iter().map(|(id, e)| (id.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
