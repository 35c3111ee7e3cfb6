//! reqwest implementation of [`StudyBackend`].

use super::{RecentResults, StatusResponse, StudyBackend, SubmitResponse, TokenResponse};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::upload::ProcessingRequest;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Longest error body quoted in an error message.
const MAX_DETAIL_CHARS: usize = 300;

const LOGIN_ENDPOINT: &str = "/token/";

/// HTTP client for a StudyBuddy backend.
///
/// Holds the bearer token so every request is authorised the same way; the
/// controller updates it on login, logout and session restore.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout_secs: u64,
    token: RwLock<Option<String>>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("has_token", &self.has_token())
            .finish()
    }
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/task-status/{id}` with the id as one percent-encoded segment.
    fn task_status_url(&self, task_id: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.url("/task-status/"))
            .map_err(|e| ClientError::Internal(format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Internal(format!("Base URL cannot have a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .push(task_id);
        Ok(url)
    }

    fn has_token(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    /// A 401 on a protected endpoint without a token means nobody logged in.
    fn auth_error(&self, endpoint: &str, detail: String) -> ClientError {
        if endpoint != LOGIN_ENDPOINT && !self.has_token() {
            ClientError::NotAuthenticated
        } else {
            ClientError::Unauthorized { detail }
        }
    }

    /// Add the bearer token, if any.
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.token.read().ok().and_then(|t| t.clone());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response, ClientError> {
        debug!("Request {}", endpoint);
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body, status);
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.auth_error(endpoint, detail));
        }
        Err(ClientError::Http {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail,
        })
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        response: Response,
    ) -> Result<T, ClientError> {
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;
        serde_json::from_str(&body).map_err(|e| ClientError::UnexpectedResponse {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        })
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                endpoint: endpoint.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            ClientError::Request {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// FastAPI puts the reason in `detail`; fall back to the raw body.
fn error_detail(body: &str, status: StatusCode) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        match map.get("detail") {
            Some(Value::String(s)) => return s.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no details")
            .to_string();
    }
    body.chars().take(MAX_DETAIL_CHARS).collect()
}

#[async_trait]
impl StudyBackend for HttpBackend {
    async fn process_material(
        &self,
        request: &ProcessingRequest,
    ) -> Result<SubmitResponse, ClientError> {
        let endpoint = "/process-material/";
        let part = Part::bytes(request.bytes().to_vec())
            .file_name(request.file_name().to_string())
            .mime_str(request.content_type())
            .map_err(|e| ClientError::Internal(format!("Invalid content type: {e}")))?;
        let form = Form::new().part("file", part);

        let response = self
            .send(endpoint, self.client.post(self.url(endpoint)).multipart(form))
            .await?;
        self.read_json(endpoint, response).await
    }

    async fn task_status(&self, task_id: &str) -> Result<StatusResponse, ClientError> {
        let endpoint = format!("/task-status/{task_id}");
        let url = self.task_status_url(task_id)?;
        let response = self.send(&endpoint, self.client.get(url)).await?;
        self.read_json(&endpoint, response).await
    }

    async fn recent_results(&self) -> Result<RecentResults, ClientError> {
        let endpoint = "/recent-results/";
        let response = self
            .send(endpoint, self.client.get(self.url(endpoint)))
            .await?;
        let body: Value = self.read_json(endpoint, response).await?;
        RecentResults::from_value(body)
    }

    async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ClientError> {
        let endpoint = LOGIN_ENDPOINT;
        let builder = self
            .client
            .post(self.url(endpoint))
            .form(&[("username", username), ("password", password)]);
        let response = self.send(endpoint, builder).await?;
        self.read_json(endpoint, response).await
    }

    async fn register(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let endpoint = "/register/";
        let builder = self
            .client
            .post(self.url(endpoint))
            .query(&[("username", username), ("password", password)]);
        let response = self.send(endpoint, builder).await?;
        let body: Value = self.read_json(endpoint, response).await?;
        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Registered")
            .to_string())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }
}
