//! Tera rendering engine: [`TemplateKind`] enum and [`Renderer`].
//!
//! | Kind                | Template                        | Used by                  |
//! |---------------------|---------------------------------|--------------------------|
//! | `SystemPrompt`      | `prompt/system.md.tera`         | content transformer      |
//! | `CommitUnattended`  | `git/commit_unattended.txt.tera`| change applier (CI runs) |
//! | `CommitInteractive` | `git/commit_interactive.txt.tera`| change applier (local)  |
//! | `PullRequestTitle`  | `github/pr_title.txt.tera`      | pull request publisher   |
//! | `PullRequestBody`   | `github/pr_body.md.tera`        | pull request publisher   |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::{to_tera_context, CommitContext, PromptContext, PullRequestContext};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("prompt/system.md.tera", include_str!("templates/system_prompt.md.tera")),
    (
        "git/commit_unattended.txt.tera",
        include_str!("templates/commit_unattended.txt.tera"),
    ),
    (
        "git/commit_interactive.txt.tera",
        include_str!("templates/commit_interactive.txt.tera"),
    ),
    ("github/pr_title.txt.tera", include_str!("templates/pr_title.txt.tera")),
    ("github/pr_body.md.tera", include_str!("templates/pr_body.md.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Override templates from `dir`, keyed by their path relative to `dir`.
/// `dir/git/commit_unattended.txt.tera` replaces the embedded template of the same name.
fn load_override_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents.replace("\r\n", "\n")));
    }
    Ok(templates)
}

fn build_tera(override_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| (normalize_template_name(Path::new(name)), (*content).to_string()))
        .collect();
    if let Some(dir) = override_dir {
        for (name, content) in load_override_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

/// Every template the tool renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    SystemPrompt,
    CommitUnattended,
    CommitInteractive,
    PullRequestTitle,
    PullRequestBody,
}

impl TemplateKind {
    pub fn all() -> &'static [TemplateKind] {
        &[
            TemplateKind::SystemPrompt,
            TemplateKind::CommitUnattended,
            TemplateKind::CommitInteractive,
            TemplateKind::PullRequestTitle,
            TemplateKind::PullRequestBody,
        ]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::SystemPrompt => "prompt/system.md.tera",
            TemplateKind::CommitUnattended => "git/commit_unattended.txt.tera",
            TemplateKind::CommitInteractive => "git/commit_interactive.txt.tera",
            TemplateKind::PullRequestTitle => "github/pr_title.txt.tera",
            TemplateKind::PullRequestBody => "github/pr_body.md.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders every [`TemplateKind`]. Create once and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_overrides(None)
    }

    /// Embedded templates plus any `.tera` overrides found in `override_dir`.
    pub fn with_overrides(override_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(Renderer {
            tera: build_tera(override_dir)?,
        })
    }

    fn render<T: serde::Serialize>(&self, kind: TemplateKind, ctx: &T) -> Result<String, RenderError> {
        let tera_ctx = to_tera_context(ctx)?;
        let out = self.tera.render(kind.template_name(), &tera_ctx)?;
        Ok(out.replace("\r\n", "\n"))
    }

    fn render_required<T: serde::Serialize>(
        &self,
        kind: TemplateKind,
        ctx: &T,
    ) -> Result<String, RenderError> {
        let out = self.render(kind, ctx)?;
        let trimmed = out.trim();
        if trimmed.is_empty() {
            return Err(RenderError::Empty {
                name: kind.template_name(),
            });
        }
        Ok(trimmed.to_string())
    }

    /// System prompt grounding the generation call.
    pub fn system_prompt(&self, ctx: &PromptContext) -> Result<String, RenderError> {
        self.render(TemplateKind::SystemPrompt, ctx)
    }

    /// Commit message; unattended runs credit the requesting actor.
    pub fn commit_message(
        &self,
        ctx: &CommitContext,
        unattended: bool,
    ) -> Result<String, RenderError> {
        let kind = if unattended {
            TemplateKind::CommitUnattended
        } else {
            TemplateKind::CommitInteractive
        };
        self.render_required(kind, ctx)
    }

    /// `(title, body)` for a pull request.
    pub fn pull_request(&self, ctx: &PullRequestContext) -> Result<(String, String), RenderError> {
        let title = self.render_required(TemplateKind::PullRequestTitle, ctx)?;
        let body = self.render_required(TemplateKind::PullRequestBody, ctx)?;
        Ok((title, body))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
