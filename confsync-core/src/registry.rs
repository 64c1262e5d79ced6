//! Target registry.
//!
//! Resolves the ordered list of [`Target`]s for a run: exactly one parser
//! target first, then two targets (production and development config) per
//! config repository.
//!
//! ```text
//! [parser]  ubiquity-os/ubiquity-os-kernel  src/github/types/plugin-configuration.ts
//! [config]  <owner>/<repo>                  .github/.ubiquity-os.config.yml
//! [config]  <owner>/<repo>                  .github/.ubiquity-os.config.dev.yml
//! ...
//! ```
//!
//! Resolution is pure: no filesystem, git, or network access.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;
use crate::types::{RepoSlug, Target, TargetKind};

// ---------------------------------------------------------------------------
// 1. Well-known locations
// ---------------------------------------------------------------------------

/// Canonical repository holding the configuration schema.
pub const PARSER_REPO_URL: &str = "https://github.com/ubiquity-os/ubiquity-os-kernel.git";

/// Schema source file inside [`PARSER_REPO_URL`].
pub const PARSER_FILE_PATH: &str = "src/github/types/plugin-configuration.ts";

/// Production configuration file inside every config repository.
pub const CONFIG_FILE_PATH: &str = ".github/.ubiquity-os.config.yml";

/// Development configuration file inside every config repository.
pub const DEV_CONFIG_FILE_PATH: &str = ".github/.ubiquity-os.config.dev.yml";

/// Config repositories used when no URLs are given on the command line.
pub const DEFAULT_CONFIG_REPO_URLS: [&str; 3] = [
    "https://github.com/ubiquity/.ubiquity-os.git",
    "https://github.com/ubiquity-os/.ubiquity-os.git",
    "https://github.com/ubiquity-os-marketplace/.ubiquity-os.git",
];

// ---------------------------------------------------------------------------
// 2. URL parsing
// ---------------------------------------------------------------------------

fn github_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|//|@)github\.com[/:]([^/\s:]+)/([^/\s]+?)(?:\.git)?/?$")
            .unwrap_or_else(|e| panic!("static regex failed to compile: {e}"))
    })
}

/// Extract `owner/repo` from a GitHub URL.
///
/// Accepts `https://github.com/<owner>/<repo>` with an optional `.git`
/// suffix. Anything else is [`ConfigError::InvalidUrl`].
pub fn parse_github_url(url: &str) -> Result<RepoSlug, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        url: url.to_string(),
    };
    let caps = github_url_pattern().captures(url.trim()).ok_or_else(invalid)?;
    let owner = caps.get(1).map(|m| m.as_str()).ok_or_else(invalid)?;
    let repo = caps.get(2).map(|m| m.as_str()).ok_or_else(invalid)?;
    if repo.is_empty() || repo == ".git" {
        return Err(invalid());
    }
    // Both segments become directories under the storage root.
    if [owner, repo].iter().any(|s| *s == "." || *s == "..") {
        return Err(invalid());
    }
    Ok(RepoSlug::new(owner, repo))
}

// ---------------------------------------------------------------------------
// 3. Resolution
// ---------------------------------------------------------------------------

/// Expand one repository URL into its targets.
fn expand(kind: TargetKind, url: &str) -> Result<Vec<Target>, ConfigError> {
    let slug = parse_github_url(url)?;
    let targets = match kind {
        TargetKind::Parser => vec![Target::new(kind, slug, url, PARSER_FILE_PATH)],
        TargetKind::Config => vec![
            Target::new(kind, slug.clone(), url, CONFIG_FILE_PATH),
            Target::new(kind, slug, url, DEV_CONFIG_FILE_PATH),
        ],
    };
    Ok(targets)
}

/// Resolve the targets for a run.
///
/// `config_urls` are the repository URLs given on the command line; an empty
/// slice selects [`DEFAULT_CONFIG_REPO_URLS`]. The parser target is always
/// first. Every URL is validated before any target is returned, so a bad URL
/// fails the run before any network activity.
pub fn resolve_targets<S: AsRef<str>>(config_urls: &[S]) -> Result<Vec<Target>, ConfigError> {
    let urls: Vec<&str> = if config_urls.is_empty() {
        DEFAULT_CONFIG_REPO_URLS.to_vec()
    } else {
        config_urls.iter().map(AsRef::as_ref).collect()
    };

    let mut targets = expand(TargetKind::Parser, PARSER_REPO_URL)?;
    for url in urls {
        targets.extend(expand(TargetKind::Config, url)?);
    }
    Ok(targets)
}

/// The parser target of a resolved list.
pub fn parser_target(targets: &[Target]) -> Option<&Target> {
    targets.iter().find(|t| t.kind == TargetKind::Parser)
}

/// Config targets of a resolved list, in registry order.
pub fn config_targets(targets: &[Target]) -> impl Iterator<Item = &Target> {
    targets.iter().filter(|t| t.kind == TargetKind::Config)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
