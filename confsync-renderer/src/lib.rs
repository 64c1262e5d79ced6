//! # confsync-renderer
//!
//! Tera-based rendering of every piece of text the tool produces: the
//! generation system prompt, commit messages, and pull request title/body.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use confsync_core::Target;
//! use confsync_renderer::{CommitContext, Renderer};
//!
//! fn message(target: &Target) {
//!     if let Ok(renderer) = Renderer::new() {
//!         let ctx = CommitContext::new(target, "insert all missing defaults", "octocat");
//!         if let Ok(msg) = renderer.commit_message(&ctx, true) {
//!             println!("{msg}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{CommitContext, PromptContext, PullRequestContext};
pub use engine::{Renderer, TemplateKind};
pub use error::RenderError;
