//! Unified diffs for `--dry-run`.

use similar::TextDiff;

/// Unified diff of `original` against `modified`, labelled with the
/// repo-relative `path`. Empty when the two are identical.
pub fn unified_diff(path: &str, original: &str, modified: &str) -> String {
    if original == modified {
        return String::new();
    }
    let old_header = format!("a/{path}");
    let new_header = format!("b/{path}");
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}
