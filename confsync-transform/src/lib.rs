//! # confsync-transform
//!
//! Content transformation: `(original, instruction, schema, repo) -> new content`.
//!
//! - [`manifest`]: plugin references in a config and their manifests
//! - [`anthropic`]: streaming Messages API client
//! - [`transformer`]: the [`ContentTransformer`] seam and its implementations

pub mod anthropic;
pub mod error;
pub mod manifest;
pub mod transformer;

pub use error::TransformError;
pub use transformer::{
    build_transformer, finalize_output, ContentTransformer, LlmTransformer, TransformRequest,
};

#[cfg(feature = "mock-generation")]
pub use transformer::FixtureTransformer;
