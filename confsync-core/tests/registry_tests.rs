//! Target registry properties over arbitrary URL lists.

use std::path::PathBuf;

use confsync_core::{
    registry::{self, CONFIG_FILE_PATH, DEV_CONFIG_FILE_PATH, PARSER_REPO_URL},
    ConfigError, RepoSlug, TargetKind,
};

fn urls(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("https://github.com/org{i}/cfg-{i}.git"))
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Cardinality
// ---------------------------------------------------------------------------

#[test]
fn one_parser_plus_two_targets_per_config_url() {
    for n in 1..=6 {
        let targets = registry::resolve_targets(&urls(n)).expect("resolve");
        assert_eq!(targets.len(), 1 + 2 * n, "n = {n}");
        let parsers = targets.iter().filter(|t| t.kind == TargetKind::Parser).count();
        assert_eq!(parsers, 1);
        assert_eq!(targets[0].url, PARSER_REPO_URL);
    }
}

#[test]
fn each_config_repo_contributes_prod_then_dev() {
    let targets = registry::resolve_targets(&urls(2)).expect("resolve");
    let files: Vec<PathBuf> = targets[1..].iter().map(|t| t.file_path.clone()).collect();
    assert_eq!(
        files,
        vec![
            PathBuf::from(CONFIG_FILE_PATH),
            PathBuf::from(DEV_CONFIG_FILE_PATH),
            PathBuf::from(CONFIG_FILE_PATH),
            PathBuf::from(DEV_CONFIG_FILE_PATH),
        ]
    );
}

// ---------------------------------------------------------------------------
// 2. Mirror directory is a pure function of owner/repo
// ---------------------------------------------------------------------------

#[test]
fn local_dir_depends_only_on_owner_and_repo() {
    let a = registry::resolve_targets(&["https://github.com/acme/conf.git"]).expect("a");
    let b = registry::resolve_targets(&["https://github.com/acme/conf"]).expect("b");
    assert_eq!(a[1].local_dir, b[1].local_dir);
    assert_eq!(a[1].local_dir, RepoSlug::new("acme", "conf").local_dir());
    assert_eq!(a[1].local_dir, a[2].local_dir);
}

#[test]
fn distinct_repos_get_distinct_dirs() {
    let targets = registry::resolve_targets(&urls(3)).expect("resolve");
    let mut dirs: Vec<_> = targets.iter().map(|t| t.local_dir.clone()).collect();
    dirs.sort();
    dirs.dedup();
    assert_eq!(dirs.len(), 4, "parser + three config repos");
}

// ---------------------------------------------------------------------------
// 3. Malformed input
// ---------------------------------------------------------------------------

#[test]
fn malformed_url_is_a_configuration_error_naming_the_url() {
    let err = registry::resolve_targets(&["ftp://example.org/nope"]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl { ref url } if url == "ftp://example.org/nope"));
    assert!(err.to_string().contains("ftp://example.org/nope"));
}

#[rstest::rstest]
#[case("https://github.com/../cfg")]
#[case("https://github.com/acme/..")]
#[case("https://github.com/./cfg.git")]
#[case("git@github.com:acme/..")]
#[case("https://github.com/acme/...git")]
fn dot_segments_cannot_escape_the_storage_root(#[case] url: &str) {
    let err = registry::resolve_targets(&[url]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl { .. }), "{url}");
}

#[test]
fn dots_inside_names_are_still_accepted() {
    let slug = registry::parse_github_url("https://github.com/acme/my.cfg.repo.git").expect("slug");
    assert_eq!(slug, RepoSlug::new("acme", "my.cfg.repo"));
}
