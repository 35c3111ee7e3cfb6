//! # studybuddy-client
//!
//! Client for the StudyBuddy backend: upload course material as a PDF, follow
//! the background task that turns it into study aids, and decode the result
//! into an explanation, a multiple-choice quiz, flashcards and a summary.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Validate  type (magic bytes) and size, before any network call
//!  ├─ 2. Submit    POST /process-material/  → cache hit or task id
//!  ├─ 3. Poll      GET /task-status/{id} every 2 s until Success / Failure
//!  ├─ 4. Fetch     GET /recent-results/     → raw model output
//!  └─ 5. Parse     fences, truncation repair, field aliases → ParsedResult
//! ```
//!
//! Model output is not trusted to be valid JSON. The quiz and the flashcards
//! are decoded separately, so a deck cut off by the model's token limit loses
//! at most its last answer and never takes the rest of the result with it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use studybuddy_client::{ClientConfig, ProcessingRequest, StateStore, StudyController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .max_attempts(300)
//!         .build()?;
//!     let request = ProcessingRequest::from_path("chapter1.pdf", &config.constraints).await?;
//!
//!     let mut controller = StudyController::with_http(config, StateStore::open_default()?)?;
//!     let outcome = controller.process(&request).await?;
//!     println!("{}", outcome.result.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `studybuddy` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! studybuddy-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod parser;
pub mod progress;
pub mod result;
pub mod session;
pub mod status;
pub mod store;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{HttpBackend, RecentEntry, RecentResults, StudyBackend};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::{ProcessOutcome, StudyController, SubmissionOutcome};
pub use error::{ClientError, PayloadError};
pub use parser::{lookup_alias, parse_tolerant, text_alias, try_parse};
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback};
pub use result::{Evaluation, Flashcard, FlashcardDeck, ParsedResult, QuizQuestion};
pub use session::{decode_token, Session};
pub use status::{ControllerState, TaskStatus};
pub use store::{milestone_reached, ClientState, StateStore};
pub use upload::{ProcessingRequest, UploadConstraints};
