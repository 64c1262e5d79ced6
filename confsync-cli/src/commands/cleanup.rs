//! `sync-configs cleanup`: delete stale topic branches left by earlier runs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use confsync_core::{registry, ConfigError, RepoSlug, Settings};
use confsync_sync::{cleanup_topic_branches, GitHubClient};

/// Arguments for `sync-configs cleanup`.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Config repository URLs. Omit to use the built-in fleet.
    pub urls: Vec<String>,

    /// List what would be deleted without deleting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Root directory for local mirrors.
    #[arg(long, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,
}

impl CleanupArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let targets = registry::resolve_targets(&self.urls)?;
        let mut settings = Settings::from_env()?;
        if let Some(dir) = self.storage_dir {
            settings.storage_root = dir;
        }
        if settings.token().is_none() {
            return Err(ConfigError::MissingVar { name: "AUTH_TOKEN" }.into());
        }

        let mut repos: Vec<&RepoSlug> = Vec::new();
        for t in registry::config_targets(&targets) {
            if !repos.contains(&&t.slug) {
                repos.push(&t.slug);
            }
        }

        info!("checking {} repositories for stale topic branches", repos.len());
        let client = GitHubClient::from_settings(reqwest::Client::new(), &settings);
        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        let mut failed = false;
        for repo in repos {
            match cleanup_topic_branches(&client, &settings.storage_root, repo, self.dry_run).await
            {
                Ok(report) => {
                    println!(
                        "{prefix}{} {repo}: {} remote, {} local branch(es)",
                        "✓".green(),
                        report.remote.len(),
                        report.local.len()
                    );
                    for name in report.remote.iter().chain(&report.local) {
                        println!("    {name}");
                    }
                    for err in &report.errors {
                        failed = true;
                        println!("    {} {err}", "✗".red());
                    }
                }
                Err(e) => {
                    failed = true;
                    println!("{prefix}{} {repo}: {e}", "✗".red());
                }
            }
        }

        Ok(if failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}
