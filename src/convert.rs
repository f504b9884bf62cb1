//! Conversion entry points.
//!
//! [`Converter`] ties the pieces together for one URL:
//!
//! ```text
//! cache.exists? ──yes──▶ cache.find ──▶ Success(cached)
//!      │ no
//!      ▼
//! factory.create ──▶ processor.convert ──▶ Success ──▶ cache.store
//!                                     └──▶ Failure (never cached)
//! ```
//!
//! Collaborators may reject a call outright (`Err`) or even panic;
//! [`Converter::convert`] catches both and always returns an [`Outcome`].
//! A cache write that fails after a successful conversion turns the whole
//! conversion into a failure.
//!
//! [`CacheStore`] methods block on file I/O, so they run on tokio's
//! blocking pool rather than on the executor.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{BoxError, Cause, Error};
use crate::outcome::Outcome;
use crate::processor::ProcessorFactory;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, warn};

/// Converts URLs, consulting an optional cache first.
///
/// # Example
/// ```rust,no_run
/// use edgequake_url2md::{Config, Converter, FileCacheStore};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let converter = Converter::new(Config::from_env())
///     .with_cache_store(Arc::new(FileCacheStore::new("tmp/cache.json")));
/// let outcome = converter.convert("https://example.com").await;
/// if outcome.is_success() {
///     println!("{}", outcome.payload());
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct Converter {
    config: Config,
    processor: Arc<dyn ProcessorFactory>,
    cache_store: Option<Arc<dyn CacheStore>>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("cache_store", &self.cache_store.as_ref().map(|_| "<dyn CacheStore>"))
            .finish()
    }
}

impl Converter {
    /// A converter using `config.default_processor` and no cache.
    pub fn new(config: Config) -> Self {
        let processor = Arc::clone(&config.default_processor);
        Self {
            config,
            processor,
            cache_store: None,
        }
    }

    pub fn with_processor(mut self, factory: Arc<dyn ProcessorFactory>) -> Self {
        self.processor = factory;
        self
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Convert `url` to Markdown. Never panics and never returns `Err`.
    pub async fn convert(&self, url: &str) -> Outcome<Value> {
        info!("Converting {}", url);

        let attempt = AssertUnwindSafe(self.run(url)).catch_unwind().await;
        let error = match attempt {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(raised)) => Error::from_raised(raised),
            Err(panic) => Error::from_panic(panic),
        };

        warn!("Conversion of {} failed: {}", url, error);
        Outcome::Failure(error)
    }

    async fn run(&self, url: &str) -> Result<Outcome<Value>, BoxError> {
        if let Some(cache) = &self.cache_store {
            let key = url.to_owned();
            let cached = on_blocking_pool(cache, move |cache| {
                if cache.exists(&key)? {
                    cache.find(&key).map(Some)
                } else {
                    Ok(None)
                }
            })
            .await?;
            if let Some(cached) = cached {
                info!("Cache hit for {}", url);
                info!("Completed {}", url);
                return Ok(Outcome::Success(cached));
            }
        }

        let processor = self.processor.create(&self.config)?;
        let outcome = processor.convert(url).await?;

        if let (Some(cache), Outcome::Success(payload)) = (&self.cache_store, &outcome) {
            let key = url.to_owned();
            let payload = payload.clone();
            on_blocking_pool(cache, move |cache| cache.store(&key, &payload)).await?;
        }

        info!("Completed {}", url);
        Ok(outcome)
    }
}

/// Run a cache operation on tokio's blocking pool; store I/O is synchronous.
async fn on_blocking_pool<T, F>(cache: &Arc<dyn CacheStore>, op: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(&dyn CacheStore) -> Result<T, Error> + Send + 'static,
{
    let cache = Arc::clone(cache);
    tokio::task::spawn_blocking(move || op(&*cache))
        .await
        .map_err(|e| Error::Unexpected {
            message: format!("Cache task failed: {e}"),
            source: Some(Arc::new(e) as Cause),
        })?
}

/// Convert `url` with the default processor and no cache.
pub async fn convert(url: impl AsRef<str>, config: &Config) -> Outcome<Value> {
    Converter::new(config.clone()).convert(url.as_ref()).await
}

/// Convert `url` with the default processor, reading and filling `store`.
pub async fn convert_with_cache(
    url: impl AsRef<str>,
    config: &Config,
    store: Arc<dyn CacheStore>,
) -> Outcome<Value> {
    Converter::new(config.clone())
        .with_cache_store(store)
        .convert(url.as_ref())
        .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary current-thread tokio runtime internally, so it must
/// not be called from inside an async context.
pub fn convert_sync(url: impl AsRef<str>, config: &Config) -> Outcome<Value> {
    convert_sync_with(Converter::new(config.clone()), url)
}

/// Synchronous wrapper around [`Converter::convert`].
pub fn convert_sync_with(converter: Converter, url: impl AsRef<str>) -> Outcome<Value> {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(converter.convert(url.as_ref())),
        Err(e) => Outcome::Failure(Error::Unexpected {
            message: format!("Failed to create tokio runtime: {e}"),
            source: Some(Arc::new(e) as Cause),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::error::ErrorCategory;
    use crate::processor::Processor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const URL: &str = "https://example.com";

    // ── Fakes ────────────────────────────────────────────────────────────

    enum Reply {
        Succeed(Value),
        Fail(Error),
        Raise(&'static str),
        Panic,
    }

    struct FakeProcessor {
        reply: Arc<Reply>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Processor for FakeProcessor {
        async fn convert(&self, _url: &str) -> Result<Outcome<Value>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &*self.reply {
                Reply::Succeed(v) => Ok(Outcome::success(v.clone())),
                Reply::Fail(e) => Ok(Outcome::failure(e.clone())),
                Reply::Raise(msg) => Err((*msg).into()),
                Reply::Panic => panic!("processor blew up"),
            }
        }
    }

    fn fake(reply: Reply) -> (Arc<dyn ProcessorFactory>, Arc<AtomicUsize>) {
        let reply = Arc::new(reply);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory = move |_: &Config| -> Result<Box<dyn Processor>, Error> {
            Ok(Box::new(FakeProcessor {
                reply: Arc::clone(&reply),
                calls: Arc::clone(&counter),
            }))
        };
        let factory: Arc<dyn ProcessorFactory> = Arc::new(factory);
        (factory, calls)
    }

    /// Memory store that counts writes and can be told to fail them.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryCacheStore,
        stores: AtomicUsize,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl CacheStore for RecordingStore {
        fn exists(&self, key: &str) -> Result<bool, Error> {
            if self.fail_reads {
                return Err(Error::CacheRead {
                    message: "cache file is not valid JSON".into(),
                    source: None,
                });
            }
            self.inner.exists(key)
        }
        fn find(&self, key: &str) -> Result<Value, Error> {
            self.inner.find(key)
        }
        fn store(&self, key: &str, value: &Value) -> Result<(), Error> {
            self.stores.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(Error::CacheWrite {
                    message: "disk full".into(),
                    source: None,
                });
            }
            self.inner.store(key, value)
        }
        fn invalidate(&self, key: &str) -> Result<(), Error> {
            self.inner.invalidate(key)
        }
        fn clear(&self) -> Result<(), Error> {
            self.inner.clear()
        }
    }

    // ── Log capture ──────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn info_lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .filter(|l| l.contains("INFO"))
                .map(str::to_owned)
                .collect()
        }
    }

    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        (buffer, tracing::subscriber::set_default(subscriber))
    }

    // ── Tests ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn cache_hit_skips_processor() {
        let (logs, _guard) = capture_logs();
        let store = Arc::new(RecordingStore::default());
        store.inner.store(URL, &json!("cached")).unwrap();
        let (factory, calls) = fake(Reply::Succeed(json!("fresh")));

        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .with_cache_store(store.clone())
            .convert(URL)
            .await;

        assert_eq!(*outcome.payload(), json!("cached"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.stores.load(Ordering::SeqCst), 0);

        let lines = logs.info_lines();
        assert_eq!(lines.len(), 3, "got: {lines:?}");
        assert!(lines[0].contains("Converting https://example.com"));
        assert!(lines[1].contains("Cache hit for https://example.com"));
        assert!(lines[2].contains("Completed https://example.com"));
    }

    #[tokio::test]
    async fn cache_miss_converts_and_stores() {
        let store = Arc::new(RecordingStore::default());
        let (factory, calls) = fake(Reply::Succeed(json!("markdown")));
        let converter = Converter::new(Config::default())
            .with_processor(factory)
            .with_cache_store(store.clone());

        let outcome = converter.convert(URL).await;
        assert_eq!(*outcome.payload(), json!("markdown"));
        assert_eq!(store.inner.find(URL).unwrap(), json!("markdown"));

        let again = converter.convert(URL).await;
        assert_eq!(*again.payload(), json!("markdown"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stores.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let (logs, _guard) = capture_logs();
        let store = Arc::new(RecordingStore::default());
        let (factory, _calls) = fake(Reply::Fail(Error::Server {
            status_code: 500,
            response_body: "boom".into(),
        }));

        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .with_cache_store(store.clone())
            .convert(URL)
            .await;

        assert!(matches!(outcome.error(), Error::Server { .. }));
        assert_eq!(store.stores.load(Ordering::SeqCst), 0);
        assert!(!store.exists(URL).unwrap());
        assert_eq!(logs.info_lines().len(), 2);
    }

    #[tokio::test]
    async fn logs_start_and_completion_without_cache() {
        let (logs, _guard) = capture_logs();
        let (factory, _calls) = fake(Reply::Succeed(json!("ok")));

        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .convert(URL)
            .await;

        assert!(outcome.is_success());
        let lines = logs.info_lines();
        assert_eq!(lines.len(), 2, "got: {lines:?}");
        assert!(lines[0].contains("Converting https://example.com"));
        assert!(lines[1].contains("Completed https://example.com"));
    }

    #[tokio::test]
    async fn raised_foreign_errors_are_wrapped() {
        let (logs, _guard) = capture_logs();
        let (factory, _calls) = fake(Reply::Raise("Boom"));

        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .convert(URL)
            .await;

        let error = outcome.error();
        assert_eq!(error.category(), ErrorCategory::Root);
        assert_eq!(error.to_string(), "Boom");
        assert!(std::error::Error::source(error).is_some());
        // Only the start line: the run never completed.
        assert_eq!(logs.info_lines().len(), 1);
    }

    #[tokio::test]
    async fn raised_taxonomy_errors_pass_through() {
        let factory = |_: &Config| -> Result<Box<dyn Processor>, Error> {
            Err(Error::missing_credentials("Missing Cloudflare API token"))
        };

        let outcome = Converter::new(Config::default())
            .with_processor(Arc::new(factory))
            .convert(URL)
            .await;

        assert!(matches!(outcome.error(), Error::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let (factory, calls) = fake(Reply::Panic);

        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .convert(URL)
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outcome.error().to_string().contains("processor blew up"));
    }

    #[tokio::test]
    async fn cache_write_failure_overrides_success() {
        let store = Arc::new(RecordingStore {
            fail_writes: true,
            ..RecordingStore::default()
        });
        let (factory, calls) = fake(Reply::Succeed(json!("markdown")));

        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .with_cache_store(store)
            .convert(URL)
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome.error(), Error::CacheWrite { .. }));
    }

    #[tokio::test]
    async fn cache_read_failure_skips_processor() {
        let store = Arc::new(RecordingStore {
            fail_reads: true,
            ..RecordingStore::default()
        });
        let (factory, calls) = fake(Reply::Succeed(json!("markdown")));

        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .with_cache_store(store.clone())
            .convert(URL)
            .await;

        assert!(matches!(outcome.error(), Error::CacheRead { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.stores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn null_payload_is_fetched_again() {
        let store = Arc::new(MemoryCacheStore::new());
        let (factory, calls) = fake(Reply::Succeed(Value::Null));
        let converter = Converter::new(Config::default())
            .with_processor(factory)
            .with_cache_store(store.clone());

        assert_eq!(*converter.convert(URL).await.payload(), Value::Null);
        assert_eq!(*converter.convert(URL).await.payload(), Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!store.exists(URL).unwrap());
    }

    #[tokio::test]
    async fn panicking_cache_becomes_failure() {
        struct PanickingStore;

        impl CacheStore for PanickingStore {
            fn exists(&self, _key: &str) -> Result<bool, Error> {
                panic!("store exploded")
            }
            fn find(&self, key: &str) -> Result<Value, Error> {
                Err(crate::cache::cache_miss(key))
            }
            fn store(&self, _key: &str, _value: &Value) -> Result<(), Error> {
                Ok(())
            }
            fn invalidate(&self, _key: &str) -> Result<(), Error> {
                Ok(())
            }
            fn clear(&self) -> Result<(), Error> {
                Ok(())
            }
        }

        let (factory, calls) = fake(Reply::Succeed(json!("markdown")));
        let outcome = Converter::new(Config::default())
            .with_processor(factory)
            .with_cache_store(Arc::new(PanickingStore))
            .convert(URL)
            .await;

        let error = outcome.error();
        assert_eq!(error.category(), ErrorCategory::Root);
        assert!(error.to_string().starts_with("Cache task failed"), "got: {error}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_processor_without_credentials_fails() {
        let outcome = convert(URL, &Config::default()).await;
        assert!(matches!(outcome.error(), Error::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn convert_with_cache_serves_hits() {
        let store = Arc::new(MemoryCacheStore::new());
        store.store(URL, &json!("cached")).unwrap();

        // No credentials: any attempt to build a processor would fail.
        let outcome = convert_with_cache(URL, &Config::default(), store).await;
        assert_eq!(*outcome.payload(), json!("cached"));
    }

    #[test]
    fn convert_sync_runs_outside_a_runtime() {
        let (factory, calls) = fake(Reply::Succeed(json!("sync")));
        let converter = Converter::new(Config::default()).with_processor(factory);

        let outcome = convert_sync_with(converter, URL);
        assert_eq!(*outcome.payload(), json!("sync"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let outcome = convert_sync(URL, &Config::default());
        assert!(matches!(outcome.error(), Error::MissingCredentials { .. }));
    }
}
