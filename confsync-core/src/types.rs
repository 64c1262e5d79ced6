//! Domain types for synchronization targets.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// `owner/repo` pair identifying a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Mirror directory relative to the storage root: `<owner>/<repo>`.
    ///
    /// Pure function of the slug, so repeated runs reuse the same mirror.
    pub fn local_dir(&self) -> PathBuf {
        Path::new(&self.owner).join(&self.repo)
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Role of a target in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Source of truth for the configuration schema. Read, never modified.
    Parser,
    /// A configuration file rewritten by the run.
    Config,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Parser => write!(f, "parser"),
            TargetKind::Config => write!(f, "config"),
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// One file in one repository to be synchronized.
///
/// Constructed once at startup; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub slug: RepoSlug,
    /// Mirror directory relative to the storage root.
    pub local_dir: PathBuf,
    /// Remote location, exactly as supplied (no credentials).
    pub url: String,
    /// Repo-relative path of the synchronized file.
    pub file_path: PathBuf,
}

impl Target {
    pub fn new(
        kind: TargetKind,
        slug: RepoSlug,
        url: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            local_dir: slug.local_dir(),
            slug,
            url: url.into(),
            file_path: file_path.into(),
        }
    }

    /// Base name of the synchronized file, e.g. `.ubiquity-os.config.yml`.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.to_string_lossy().into_owned())
    }

    /// Absolute mirror directory under `storage_root`.
    pub fn mirror_dir(&self, storage_root: &Path) -> PathBuf {
        storage_root.join(&self.local_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_display_and_local_dir() {
        let slug = RepoSlug::new("ubiquity", ".ubiquity-os");
        assert_eq!(slug.to_string(), "ubiquity/.ubiquity-os");
        assert_eq!(slug.local_dir(), PathBuf::from("ubiquity").join(".ubiquity-os"));
    }

    #[test]
    fn target_file_name_is_base_name() {
        let t = Target::new(
            TargetKind::Config,
            RepoSlug::new("o", "r"),
            "https://github.com/o/r",
            ".github/.ubiquity-os.config.dev.yml",
        );
        assert_eq!(t.file_name(), ".ubiquity-os.config.dev.yml");
        assert_eq!(t.mirror_dir(Path::new("/srv")), PathBuf::from("/srv/o/r"));
    }

    #[test]
    fn target_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TargetKind::Parser).expect("serialize");
        assert_eq!(json, "\"parser\"");
    }
}
