//! `sync-configs targets`: show what a run would touch.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use confsync_core::registry;

/// Arguments for `sync-configs targets`.
#[derive(Args, Debug)]
pub struct TargetsArgs {
    /// Config repository URLs. Omit to use the built-in fleet.
    pub urls: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "file")]
    file: String,
    #[tabled(rename = "mirror")]
    mirror: String,
}

impl TargetsArgs {
    pub fn run(&self) -> Result<ExitCode> {
        let targets = registry::resolve_targets(&self.urls)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&targets)
                    .context("failed to serialize targets JSON")?
            );
            return Ok(ExitCode::SUCCESS);
        }

        let rows: Vec<TargetRow> = targets
            .iter()
            .map(|t| TargetRow {
                kind: t.kind.to_string(),
                repository: t.slug.to_string(),
                file: t.file_path.display().to_string(),
                mirror: t.local_dir.display().to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(ExitCode::SUCCESS)
    }
}
