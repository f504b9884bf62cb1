//! Cloudflare Browser Rendering integration.
//!
//! 1. [`client`]:    one HTTP call to the `/markdown` endpoint, mapped onto
//!    [`crate::Outcome`]
//! 2. [`processor`]: URL validation in front of the client, exposed as a
//!    [`crate::Processor`]

pub mod client;
pub mod processor;

pub use client::{CloudflareClient, MarkdownRequest};
pub use processor::CloudflareProcessor;
