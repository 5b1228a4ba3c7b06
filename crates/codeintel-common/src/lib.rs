//! Common utilities and patterns shared across codeintel crates
//!
//! This crate provides shared functionality to reduce duplication across
//! the various codeintel components: a small error-handling toolkit, a
//! correlation id for tracing requests across the indexing/query boundary,
//! error sanitization for externally-visible failures, and process-wide
//! environment initialization.

pub mod error;
pub mod error_sanitizer;
pub mod init;
pub mod tracing;

pub use error::{CommonError, ErrorContext};
pub use tracing::CorrelationId;
