//! Configuration for the StudyBuddy client.
//!
//! Every knob lives in [`ClientConfig`], built via [`ClientConfigBuilder`].
//! The builder lets callers set only what they care about and rely on the
//! documented defaults for the rest.

use crate::error::ClientError;
use crate::progress::ProgressCallback;
use crate::upload::UploadConstraints;
use std::fmt;

/// Backend used when no base URL is given.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for talking to a StudyBuddy backend.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use studybuddy_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://study.example.org/api")
///     .poll_interval_ms(1000)
///     .max_attempts(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_attempts, Some(300));
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the backend, without a trailing slash. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Delay between two task-status checks, in milliseconds. Default: 2000.
    ///
    /// The first check happens one interval after submission. Checks never
    /// overlap: the next one is scheduled only after the previous returned.
    pub poll_interval_ms: u64,

    /// Maximum number of status checks before giving up. Default: `None` (unbounded).
    pub max_attempts: Option<u32>,

    /// Wall-clock limit for the whole polling loop in seconds. Default: `None` (unbounded).
    pub poll_timeout_secs: Option<u64>,

    /// Stop polling on the first failed status request. Default: false.
    ///
    /// A failed status request surfaces as [`crate::TaskStatus::Error`].
    /// By default polling carries on, since the next check usually succeeds.
    pub stop_on_error: bool,

    /// Per-request HTTP timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Type and size limits for uploads. Default: PDF, 10 MiB.
    pub constraints: UploadConstraints,

    /// Receives submission and polling events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 2000,
            max_attempts: None,
            poll_timeout_secs: None,
            stop_on_error: false,
            request_timeout_secs: 60,
            constraints: UploadConstraints::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_attempts", &self.max_attempts)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("stop_on_error", &self.stop_on_error)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("constraints", &self.constraints)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ProcessingProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms.max(1);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = Some(n);
        self
    }

    pub fn poll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.poll_timeout_secs = Some(secs);
        self
    }

    pub fn stop_on_error(mut self, v: bool) -> Self {
        self.config.stop_on_error = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.constraints.max_size_bytes = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.max_attempts == Some(0) {
            return Err(ClientError::InvalidConfig("max attempts must be ≥ 1".into()));
        }
        if c.poll_timeout_secs == Some(0) {
            return Err(ClientError::InvalidConfig("poll timeout must be ≥ 1 second".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig("request timeout must be ≥ 1 second".into()));
        }
        if c.constraints.max_size_bytes == 0 {
            return Err(ClientError::InvalidConfig("max upload size must be ≥ 1 byte".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_client() {
        let c = ClientConfig::default();
        assert_eq!(c.poll_interval_ms, 2000);
        assert_eq!(c.max_attempts, None);
        assert!(!c.stop_on_error);
        assert_eq!(c.constraints.accepted_type, "application/pdf");
        assert_eq!(c.constraints.max_size_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn builder_strips_trailing_slash() {
        let c = ClientConfig::builder()
            .base_url("http://host:8000/api/")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "http://host:8000/api");
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = ClientConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(err.to_string().contains("max attempts"));
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(ClientConfig::builder().base_url("ftp://x").build().is_err());
    }

    #[test]
    fn poll_interval_never_zero() {
        let c = ClientConfig::builder().poll_interval_ms(0).build().unwrap();
        assert_eq!(c.poll_interval_ms, 1);
    }
}
