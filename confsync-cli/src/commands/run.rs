//! Default command: transform and publish every config target.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use confsync_core::{registry, ConfigError, Settings};
use confsync_renderer::Renderer;
use confsync_sync::{
    GitHubClient, GitHubPublisher, Pipeline, Publication, PublishMode, PullRequestStatus,
    RunOptions, RunReport, TargetOutcome,
};
use confsync_transform::build_transformer;

/// Arguments for the default `sync-configs` invocation.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config repository URLs. Omit to use the built-in fleet.
    pub urls: Vec<String>,

    /// The edit to apply, in plain language.
    #[arg(long, short = 'i', env = "EDITOR_INSTRUCTION", hide_env_values = true)]
    pub instruction: Option<String>,

    /// Push straight to each default branch from the existing local mirrors.
    /// No mirror sync, no topic branch, no pull request.
    #[arg(long)]
    pub push: bool,

    /// Base branch for every config repository instead of the remote HEAD.
    /// The parser repository always uses its own default branch.
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Root directory for local mirrors.
    #[arg(long, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Show the diff each target would get. Nothing is committed or pushed.
    #[arg(long)]
    pub dry_run: bool,

    /// Echo generated text to stdout while it streams.
    #[arg(long)]
    pub echo: bool,

    /// Directory of `.tera` files overriding the built-in templates.
    #[arg(long, value_name = "DIR")]
    pub template_dir: Option<PathBuf>,
}

impl RunArgs {
    pub async fn run(self) -> Result<ExitCode> {
        // Every URL is validated before any settings, git or network work.
        let targets = registry::resolve_targets(&self.urls)?;

        let mut settings = Settings::from_env()?;
        if self.push {
            settings.interactive = true;
        }
        if let Some(dir) = self.storage_dir {
            settings.storage_root = dir;
        }
        if let Some(text) = self.instruction.filter(|t| !t.trim().is_empty()) {
            settings.instruction = Some(text);
        }
        let instruction = resolve_instruction(&settings)?;
        info!(
            "{} targets, storage at {}",
            targets.len(),
            settings.storage_root.display()
        );

        let renderer = Arc::new(
            Renderer::with_overrides(self.template_dir.as_deref())
                .context("failed to load templates")?,
        );
        let http = reqwest::Client::builder()
            .user_agent(concat!("sync-configs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let transformer = build_transformer(http.clone(), &settings, renderer.clone(), self.echo);
        let publisher = GitHubPublisher::new(
            GitHubClient::from_settings(http, &settings),
            renderer.clone(),
            &settings.requested_by,
        );

        let opts = RunOptions {
            instruction,
            mode: if settings.interactive {
                PublishMode::Direct
            } else {
                PublishMode::PullRequest
            },
            sync_mirrors: !self.push,
            force_branch: self.branch,
            dry_run: self.dry_run,
        };

        let report = Pipeline::new(&settings, &renderer, transformer.as_ref(), &publisher)
            .run(&targets, &opts)
            .await
            .context("run aborted")?;

        print_report(&report, self.dry_run);
        Ok(if report.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}

/// Flag or environment first; interactive runs fall back to one line of stdin.
fn resolve_instruction(settings: &Settings) -> Result<String, ConfigError> {
    if let Some(text) = &settings.instruction {
        return Ok(text.clone());
    }
    if !settings.interactive {
        return Err(ConfigError::MissingInstruction);
    }

    eprint!("Instruction: ");
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line);
    match read {
        Ok(_) if !line.trim().is_empty() => Ok(line.trim().to_string()),
        _ => Err(ConfigError::MissingInstruction),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_report(report: &RunReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    for entry in &report.targets {
        let t = &entry.target;
        let label = format!("{} {}", t.slug, t.file_path.display());
        match &entry.outcome {
            TargetOutcome::Failed { .. } => {
                println!("{prefix}{} {label}: {}", "✗".red(), entry.outcome)
            }
            TargetOutcome::Skipped { .. } => {
                println!("{prefix}{} {label}: {}", "·".yellow(), entry.outcome)
            }
            TargetOutcome::Published(Publication::TopicBranch {
                pull_request: PullRequestStatus::Failed { .. },
                ..
            }) => println!("{prefix}{} {label}: {}", "!".yellow(), entry.outcome),
            TargetOutcome::DryRun { diff } => {
                println!("{prefix}{} {label}: {}", "~".cyan(), entry.outcome);
                print_diff(diff);
            }
            _ => println!("{prefix}{} {label}: {}", "✓".green(), entry.outcome),
        }
    }

    let failures = report.failures();
    let summary = format!("{} targets, {failures} failed", report.targets.len());
    if failures > 0 {
        println!("{prefix}{}", summary.red().bold());
    } else {
        println!("{prefix}{}", summary.green());
    }
}

fn print_diff(diff: &str) {
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", line.bold());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
}
