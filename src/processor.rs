//! The pluggable conversion strategy.
//!
//! A [`Processor`] turns one URL into a payload. [`crate::Converter`] never
//! holds a processor across calls: it asks a [`ProcessorFactory`] for a
//! fresh one on every cache miss, so construction failures (missing
//! credentials, for instance) surface as that conversion's failure.

use crate::config::Config;
use crate::error::{BoxError, Error};
use crate::outcome::Outcome;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Converts a URL into a Markdown payload.
///
/// `Err` means the call was rejected before doing any work (invalid input)
/// and may carry any error type; the converter folds foreign errors into
/// [`Error::Unexpected`]. Runtime outcomes come back as [`Outcome`].
#[async_trait]
pub trait Processor: Send + Sync {
    async fn convert(&self, _url: &str) -> Result<Outcome<Value>, BoxError> {
        Err(Error::unexpected(format!(
            "{} does not implement convert",
            std::any::type_name::<Self>()
        ))
        .into())
    }
}

#[async_trait]
impl<P: Processor + ?Sized> Processor for Arc<P> {
    async fn convert(&self, url: &str) -> Result<Outcome<Value>, BoxError> {
        (**self).convert(url).await
    }
}

/// Builds a [`Processor`] from the shared configuration.
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, config: &Config) -> Result<Box<dyn Processor>, Error>;
}

impl<F> ProcessorFactory for F
where
    F: Fn(&Config) -> Result<Box<dyn Processor>, Error> + Send + Sync,
{
    fn create(&self, config: &Config) -> Result<Box<dyn Processor>, Error> {
        self(config)
    }
}
