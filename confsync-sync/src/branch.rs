//! Default branch resolution without a clone.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::git::{authenticated_url, Git};

/// Used whenever the remote cannot tell us. A wrong guess surfaces later as
/// a loud checkout failure.
pub const FALLBACK_BRANCH: &str = "main";

fn symref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"ref: refs/heads/(\S+)\s+HEAD")
            .unwrap_or_else(|e| panic!("static regex failed to compile: {e}"))
    })
}

/// Branch name from `git ls-remote --symref <url> HEAD` output.
pub fn parse_symref(output: &str) -> Option<String> {
    symref_pattern()
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Ask the remote which branch `HEAD` points at. Never fails: any error
/// degrades to [`FALLBACK_BRANCH`].
pub async fn resolve_default_branch(url: &str, token: Option<&str>) -> String {
    let remote = authenticated_url(url, token);
    let git = Git::new().redacting(token);
    match git.run(&["ls-remote", "--symref", &remote, "HEAD"]).await {
        Ok(out) => parse_symref(&out).unwrap_or_else(|| {
            warn!("{url} did not report a HEAD symref; assuming {FALLBACK_BRANCH}");
            FALLBACK_BRANCH.to_string()
        }),
        Err(e) => {
            warn!("could not resolve default branch for {url}: {e}; assuming {FALLBACK_BRANCH}");
            FALLBACK_BRANCH.to_string()
        }
    }
}
