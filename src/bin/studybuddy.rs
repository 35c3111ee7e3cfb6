//! CLI binary for studybuddy-client.
//!
//! A thin shim over the library crate that maps CLI flags to `ClientConfig`,
//! drives a `StudyController` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use studybuddy_client::{
    milestone_reached, ClientConfig, ParsedResult, ProcessingProgressCallback, ProcessingRequest,
    ProgressCallback, RecentEntry, StateStore, StudyController, SubmissionOutcome, TaskStatus,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the controller's 0–100 progress as a bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(file_name: &str) -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix(file_name.to_string());
        bar.set_message("uploading…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_submitted(&self, outcome: &SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::CacheHit { .. } => {
                self.bar.set_position(100);
                self.bar.set_message("cached result");
            }
            SubmissionOutcome::Accepted { task_id, .. } => {
                self.bar.set_position(10);
                self.bar.println(format!(
                    "{} Task {}",
                    cyan("◆"),
                    dim(task_id)
                ));
                self.bar.set_message("queued");
            }
        }
    }

    fn on_status(&self, _task_id: &str, attempt: u32, status: &TaskStatus, progress: u8) {
        self.bar.set_position(u64::from(progress));
        let msg = match status {
            TaskStatus::Error => red("status check failed, retrying"),
            other => other.to_string().to_lowercase(),
        };
        self.bar.set_message(format!("{msg} {}", dim(&format!("#{attempt}"))));
    }

    fn on_complete(&self, _task_id: &str) {
        self.bar.set_position(100);
        self.bar.finish_and_clear();
        eprintln!("{} Processing complete", green("✔"));
    }

    fn on_failed(&self, _task_id: Option<&str>, reason: &str) {
        self.bar.abandon();
        eprintln!("{} {}", red("✘"), red(reason));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process a chapter and print the study aids as Markdown
  studybuddy process chapter1.pdf

  # Save the result as JSON
  studybuddy --json process chapter1.pdf -o chapter1.json

  # Give up after 10 minutes
  studybuddy --timeout 600 process chapter1.pdf

  # List and re-open earlier results
  studybuddy results
  studybuddy show chapter1.pdf

  # Log in once; the token is kept in the state file
  studybuddy login alice

ENVIRONMENT VARIABLES:
  STUDYBUDDY_API_URL        Backend base URL (default http://localhost:8000)
  STUDYBUDDY_POLL_INTERVAL  Milliseconds between status checks (default 2000)
  STUDYBUDDY_MAX_ATTEMPTS   Stop after this many status checks
  STUDYBUDDY_TIMEOUT        Stop polling after this many seconds
  STUDYBUDDY_STATE_FILE     Where counters and the token are kept
  STUDYBUDDY_PASSWORD       Password for login/register (otherwise read from stdin)
  RUST_LOG                  Override log filtering
"#;

/// Turn course PDFs into explanations, quizzes and flashcards.
#[derive(Parser, Debug)]
#[command(
    name = "studybuddy",
    version,
    about = "Turn course PDFs into explanations, quizzes and flashcards",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL.
    #[arg(long, global = true, env = "STUDYBUDDY_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Milliseconds between task-status checks.
    #[arg(long, global = true, env = "STUDYBUDDY_POLL_INTERVAL", default_value_t = 2000)]
    poll_interval: u64,

    /// Stop after this many status checks (default: unbounded).
    #[arg(long, global = true, env = "STUDYBUDDY_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Stop polling after this many seconds (default: unbounded).
    #[arg(long, global = true, env = "STUDYBUDDY_TIMEOUT")]
    timeout: Option<u64>,

    /// Stop polling on the first failed status check.
    #[arg(long, global = true, env = "STUDYBUDDY_STOP_ON_ERROR")]
    stop_on_error: bool,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, global = true, env = "STUDYBUDDY_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// State file for counters and the access token.
    #[arg(long, global = true, env = "STUDYBUDDY_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Print JSON instead of Markdown / text.
    #[arg(long, global = true, env = "STUDYBUDDY_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "STUDYBUDDY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STUDYBUDDY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "STUDYBUDDY_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF, wait for processing and print the result.
    Process {
        /// PDF file to upload.
        file: PathBuf,

        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a task once.
    Status { task_id: String },
    /// List recent results.
    Results,
    /// Print one recent result.
    Show {
        result_id: String,

        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Log in and remember the access token.
    Login {
        username: String,
        #[arg(long, env = "STUDYBUDDY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account.
    Register {
        username: String,
        #[arg(long, env = "STUDYBUDDY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored access token.
    Logout,
    /// Show study counters.
    Stats {
        /// Set the current streak back to zero.
        #[arg(long)]
        reset_streak: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so INFO logs are
    // hidden while it runs.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && matches!(cli.command, Command::Process { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = match &cli.state_file {
        Some(path) => StateStore::open(path),
        None => StateStore::open_default(),
    }
    .context("Failed to load client state")?;

    match &cli.command {
        Command::Process { file, output } => {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new(&file_name) as ProgressCallback)
            } else {
                None
            };
            let config = build_config(&cli, progress)?;
            let request = ProcessingRequest::from_path(file, &config.constraints)
                .await
                .context("File rejected")?;
            let mut controller = connect(config, store)?;

            let outcome = tokio::select! {
                r = controller.process(&request) => r.context("Processing failed")?,
                _ = tokio::signal::ctrl_c() => bail!("Interrupted; the backend keeps processing, try `studybuddy results` later"),
            };

            if outcome.submission.is_cache_hit() && !cli.quiet {
                eprintln!("{} Using cached result for {}", cyan("◆"), bold(&file_name));
            }
            emit_result(&cli, &outcome.result, output.as_ref())?;

            if !cli.quiet {
                if let Some(m) = outcome.milestone {
                    eprintln!(
                        "{} Achievement unlocked: {} documents processed!",
                        green("★"),
                        bold(&m.to_string())
                    );
                }
            }
        }

        Command::Status { task_id } => {
            let mut controller = connect(build_config(&cli, None)?, store)?;
            let status = controller.poll_once(task_id).await;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "task_id": task_id,
                        "status": status.as_str(),
                        "progress": controller.progress(),
                        "error": controller.last_failure(),
                    })
                );
            } else {
                let shown = match status {
                    TaskStatus::Success => green(status.as_str()),
                    TaskStatus::Failure | TaskStatus::Error => red(status.as_str()),
                    _ => cyan(status.as_str()),
                };
                println!("{task_id}  {shown}  {}%", controller.progress());
                if let Some(detail) = controller.last_failure() {
                    println!("  {}", dim(detail));
                }
            }
            if status == TaskStatus::Error {
                bail!("Could not read the status of task {task_id}");
            }
        }

        Command::Results => {
            let controller = connect(build_config(&cli, None)?, store)?;
            let recent = controller
                .recent_results()
                .await
                .context("Failed to list recent results")?;

            if cli.json {
                let items: Vec<_> = recent
                    .iter()
                    .map(|(id, entry)| {
                        let mut item =
                            serde_json::json!({ "result_id": id, "state": entry.label() });
                        if let RecentEntry::Processing { task_id } = entry {
                            item["task_id"] = task_id.clone().into();
                        }
                        item
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if recent.is_empty() {
                println!("{}", dim("No results yet."));
            } else {
                for (id, entry) in recent.iter() {
                    let state = match entry {
                        RecentEntry::Ready(_) => green("ready"),
                        RecentEntry::Processing { task_id } => {
                            format!("{} {}", cyan("processing"), dim(task_id))
                        }
                        RecentEntry::Failed { .. } => red("failed"),
                    };
                    println!("{id:<40} {state}");
                }
            }
        }

        Command::Show { result_id, output } => {
            let controller = connect(build_config(&cli, None)?, store)?;
            let result = controller
                .fetch_result(result_id)
                .await
                .with_context(|| format!("Failed to load '{result_id}'"))?;
            emit_result(&cli, &result, output.as_ref())?;
        }

        Command::Login { username, password } => {
            let password = read_password(password.as_deref())?;
            let mut controller = connect(build_config(&cli, None)?, store)?;
            let session = controller
                .login(username, &password)
                .await
                .context("Login failed")?;
            if !cli.quiet {
                let role = session.role.as_deref().unwrap_or("user");
                eprintln!("{} Logged in as {} ({role})", green("✔"), bold(&session.username));
            }
        }

        Command::Register { username, password } => {
            let password = read_password(password.as_deref())?;
            let controller = connect(build_config(&cli, None)?, store)?;
            let message = controller
                .register(username, &password)
                .await
                .context("Registration failed")?;
            if !cli.quiet {
                eprintln!("{} {message}", green("✔"));
            }
        }

        Command::Logout => {
            let mut controller = connect(build_config(&cli, None)?, store)?;
            controller.logout().context("Failed to clear the stored token")?;
            if !cli.quiet {
                eprintln!("{} Logged out", green("✔"));
            }
        }

        Command::Stats { reset_streak } => {
            let mut store = store;
            if *reset_streak {
                store.reset_streak().context("Failed to reset streak")?;
            }
            let docs = store.documents_processed();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(store.state())?);
            } else {
                println!("Documents processed:  {}", bold(&docs.to_string()));
                println!("Current streak:       {}", bold(&store.current_streak().to_string()));
                if let Some(m) = milestone_reached(docs) {
                    println!("{} Milestone: {m} documents", green("★"));
                }
                if let Some(path) = store.path() {
                    println!("{}", dim(&format!("State file: {}", path.display())));
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.api_url.as_str())
        .poll_interval_ms(cli.poll_interval)
        .stop_on_error(cli.stop_on_error)
        .request_timeout_secs(cli.request_timeout);
    if let Some(n) = cli.max_attempts {
        builder = builder.max_attempts(n);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.poll_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Controller with the stored session restored, if still valid.
fn connect(config: ClientConfig, store: StateStore) -> Result<StudyController> {
    let mut controller =
        StudyController::with_http(config, store).context("Failed to create HTTP client")?;
    if let Some(session) = controller.restore_session() {
        tracing::debug!("Restored session for {}", session.username);
    }
    Ok(controller)
}

fn emit_result(cli: &Cli, result: &ParsedResult, output: Option<&PathBuf>) -> Result<()> {
    let text = if cli.json {
        serde_json::to_string_pretty(result).context("Failed to serialise result")?
    } else {
        result.to_markdown()
    };

    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} Saved {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        let questions = result.evaluation.as_ref().map_or(0, |e| e.question_count());
        let cards = result.flashcards.as_ref().map_or(0, |d| d.card_count());
        eprintln!(
            "{} {} quiz questions, {} flashcards",
            cyan("◆"),
            bold(&questions.to_string()),
            bold(&cards.to_string())
        );
    }
    Ok(())
}

fn read_password(given: Option<&str>) -> Result<String> {
    if let Some(p) = given {
        return Ok(p.to_string());
    }
    eprint!("Password: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}
