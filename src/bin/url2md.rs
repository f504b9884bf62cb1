//! CLI binary for edgequake-url2md.
//!
//! A thin shim over the library crate that maps CLI flags to `Config`,
//! runs one conversion, and prints the result.
//!
//! Exit codes: 0 success, 1 conversion failed, 2 usage error or missing
//! credentials.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_url2md::{
    CacheStore, Config, Converter, Error, ErrorCategory, FileCacheStore, Outcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXIT_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  url2md https://example.com

  # Reuse earlier results from a local cache file
  url2md --cache tmp/url2md-cache.json https://example.com

  # Ignore the cached copy and fetch again
  url2md --cache tmp/url2md-cache.json --refresh https://example.com

  # Raw JSON payload
  url2md --json https://example.com > page.json

ENVIRONMENT VARIABLES:
  CLOUDFLARE_API_TOKEN    API token with Browser Rendering permission
  CLOUDFLARE_ACCOUNT_ID   Cloudflare account id
  URL2MD_CACHE            Cache file path (same as --cache)
  RUST_LOG                Override the log filter
"#;

/// Convert web pages to Markdown using Cloudflare Browser Rendering.
#[derive(Parser, Debug)]
#[command(
    name = "url2md",
    version,
    about = "Convert web pages to Markdown using Cloudflare Browser Rendering",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTTP/HTTPS URL of the page to convert.
    url: String,

    /// Cloudflare API token.
    #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Cloudflare account id.
    #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Request timeout in milliseconds.
    #[arg(long, env = "URL2MD_TIMEOUT_MS", default_value_t = 30_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Cloudflare API base URL.
    #[arg(long, env = "CLOUDFLARE_API_BASE_URL", hide = true)]
    base_url: Option<String>,

    /// Cache results in this file.
    #[arg(long, env = "URL2MD_CACHE")]
    cache: Option<PathBuf>,

    /// Drop the URL's cached entry before converting.
    #[arg(long, requires = "cache")]
    refresh: bool,

    /// Print the payload as JSON instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "URL2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "URL2MD_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress feedback, so INFO logs only show up
    // with --verbose.
    let show_progress = !cli.quiet && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let missing = missing_credentials(&cli);
    if !missing.is_empty() {
        eprintln!("Missing env vars: {}", missing.join(", "));
        eprintln!(
            "Usage: CLOUDFLARE_API_TOKEN=... CLOUDFLARE_ACCOUNT_ID=... url2md <URL>"
        );
        return ExitCode::from(EXIT_USAGE);
    }

    let converter = match build_converter(&cli) {
        Ok(converter) => converter,
        Err(setup) => {
            match &setup {
                SetupError::Usage(e) => eprintln!("{} {e:#}", red("error:")),
                SetupError::Cache(error) => report_failure(error),
            }
            return ExitCode::from(setup.exit_code());
        }
    };

    let progress = show_progress.then(|| spinner(&cli.url));
    let outcome = converter.convert(&cli.url).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    match outcome {
        Outcome::Success(payload) => match print_payload(&payload, cli.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{} {e:#}", red("error:"));
                ExitCode::from(EXIT_FAILED)
            }
        },
        Outcome::Failure(error) => {
            report_failure(&error);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn missing_credentials(cli: &Cli) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if cli.api_token.as_deref().unwrap_or("").is_empty() {
        missing.push("CLOUDFLARE_API_TOKEN");
    }
    if cli.account_id.as_deref().unwrap_or("").is_empty() {
        missing.push("CLOUDFLARE_ACCOUNT_ID");
    }
    missing
}

/// Why the converter could not be set up.
#[derive(Debug)]
enum SetupError {
    /// Bad flag values; exits with [`EXIT_USAGE`].
    Usage(anyhow::Error),
    /// `--refresh` could not drop the cached entry; exits with [`EXIT_FAILED`].
    Cache(Error),
}

impl SetupError {
    fn exit_code(&self) -> u8 {
        match self {
            SetupError::Usage(_) => EXIT_USAGE,
            SetupError::Cache(_) => EXIT_FAILED,
        }
    }
}

/// Map CLI args to a `Converter`.
fn build_converter(cli: &Cli) -> std::result::Result<Converter, SetupError> {
    let mut builder = Config::builder().timeout_ms(cli.timeout_ms);
    if let Some(ref token) = cli.api_token {
        builder = builder.api_token(token);
    }
    if let Some(ref id) = cli.account_id {
        builder = builder.account_id(id);
    }
    if let Some(ref base_url) = cli.base_url {
        builder = builder.base_url(base_url);
    }
    let config = builder
        .build()
        .context("Invalid configuration")
        .map_err(SetupError::Usage)?;

    let mut converter = Converter::new(config);
    if let Some(ref path) = cli.cache {
        let store = FileCacheStore::new(path);
        if cli.refresh {
            store.invalidate(&cli.url).map_err(SetupError::Cache)?;
        }
        converter = converter.with_cache_store(Arc::new(store));
    }
    Ok(converter)
}

fn spinner(url: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Converting");
    bar.set_message(url.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Write the payload to stdout.
///
/// A string payload, or the `markdown` field of an object payload, is
/// printed as-is; anything else (or `--json`) as pretty JSON.
fn print_payload(payload: &Value, json: bool) -> Result<()> {
    let text = match (json, markdown_text(payload)) {
        (false, Some(markdown)) => markdown.to_string(),
        _ => serde_json::to_string_pretty(payload).context("Failed to serialise payload")?,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    // Ensure a trailing newline on stdout.
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn markdown_text(payload: &Value) -> Option<&str> {
    match payload {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("markdown").and_then(Value::as_str),
        _ => None,
    }
}

fn report_failure(error: &Error) {
    match error.category() {
        ErrorCategory::Api => {
            let status = error
                .status_code()
                .map_or_else(|| "unknown".to_string(), |s| s.to_string());
            eprintln!("{}", red(&format!("Request failed (status {status}).")));
            if let Some(body) = error.response_body().filter(|b| !b.trim().is_empty()) {
                eprintln!("{body}");
            }
            if let Some(retry_after) = error.retry_after() {
                eprintln!("{}", dim(&format!("Retry after: {retry_after}")));
            }
        }
        ErrorCategory::Root
        | ErrorCategory::Configuration
        | ErrorCategory::Network
        | ErrorCategory::Validation
        | ErrorCategory::Cache => {
            eprintln!("{}", red(&error.to_string()));
            let mut source = std::error::Error::source(error);
            while let Some(cause) = source {
                eprintln!("  {}", dim(&format!("caused by: {cause}")));
                source = std::error::Error::source(cause);
            }
        }
    }
}
