//! confsync core library: target model, registry, run configuration, errors.
//!
//! - [`types`]: [`Target`], [`RepoSlug`], [`TargetKind`]
//! - [`registry`]: [`registry::resolve_targets`]
//! - [`config`]: [`Settings`]
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::{CommitIdentity, Secret, Settings};
pub use error::ConfigError;
pub use types::{RepoSlug, Target, TargetKind};
