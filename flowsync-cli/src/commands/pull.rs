//! `flowsync pull`: download categorized workflows into local files.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use colored::Colorize;

use flowsync_core::WriteResult;
use flowsync_sync::{pull, PullReport};

use super::Project;

/// Arguments for `flowsync pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Environment to pull from (config/<env>.yaml).
    pub env: String,

    /// Only pull workflows of this category.
    #[arg(long)]
    pub category: Option<String>,
}

impl PullArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let project = Project::open(root)?;
        let only = match self.category.as_deref() {
            Some(name) => Some(project.layout.category(name).cloned().ok_or_else(|| {
                anyhow!(
                    "unknown category '{name}'; configured categories: {}",
                    project
                        .layout
                        .categories
                        .iter()
                        .map(|c| c.0.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?),
            None => None,
        };
        let store = project.connect(&self.env)?;

        let report = pull(&store, &project.layout, only.as_ref())
            .with_context(|| format!("pull from '{}' failed", self.env))?;
        print_report(&project, &report);

        if !report.failures.is_empty() {
            bail!("{} workflow(s) could not be pulled", report.failures.len());
        }
        Ok(())
    }
}

fn print_report(project: &Project, report: &PullReport) {
    for pulled in &report.pulled {
        match &pulled.result {
            WriteResult::Written { path } => {
                println!("  ✎  {} {}", pulled.name.bold(), project.display_path(path))
            }
            WriteResult::Unchanged { path } => println!(
                "  ·  {} {}",
                pulled.name,
                project.display_path(path).bright_black()
            ),
        }
    }
    for skipped in &report.skipped {
        tracing::debug!("skipped \"{}\": {:?}", skipped.name, skipped.reason);
    }
    for failure in &report.failures {
        println!(
            "  ✗  {} ({}): {}",
            failure.name.bold().red(),
            failure.id,
            failure.reason
        );
    }

    let unchanged = report.pulled.len() - report.written();
    println!(
        "✓ pulled {} workflow(s) ({} written, {unchanged} unchanged, {} skipped)",
        report.pulled.len(),
        report.written(),
        report.skipped.len()
    );
}
