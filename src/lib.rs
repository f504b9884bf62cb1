//! # edgequake-url2md
//!
//! Convert web pages to Markdown through the Cloudflare Browser Rendering
//! API, with an optional persistent cache.
//!
//! The crate does not parse HTML itself. Cloudflare renders the page in a
//! headless browser and returns Markdown; this crate validates input, makes
//! the call, normalises every outcome into one error taxonomy, and caches
//! successful results so the same URL is never fetched twice.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Cache     exists? → find         (cache hit ends here)
//!  ├─ 2. Processor validate http(s) URL
//!  ├─ 3. Client    POST /accounts/{id}/browser-rendering/markdown
//!  ├─ 4. Mapping   status + body → Outcome / Error
//!  └─ 5. Cache     store on success
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_url2md::{convert, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Credentials from CLOUDFLARE_API_TOKEN / CLOUDFLARE_ACCOUNT_ID
//!     let config = Config::from_env();
//!     let outcome = convert("https://example.com", &config).await;
//!     match outcome.into_result() {
//!         Ok(markdown) => println!("{markdown}"),
//!         Err(e) => eprintln!("conversion failed: {e}"),
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `url2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod cloudflare;
pub mod config;
pub mod convert;
pub mod error;
pub mod outcome;
pub mod processor;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use cloudflare::{CloudflareClient, CloudflareProcessor, MarkdownRequest};
pub use config::{Config, ConfigBuilder};
pub use convert::{convert, convert_sync, convert_sync_with, convert_with_cache, Converter};
pub use error::{BoxError, Error, ErrorCategory};
pub use outcome::Outcome;
pub use processor::{Processor, ProcessorFactory};
