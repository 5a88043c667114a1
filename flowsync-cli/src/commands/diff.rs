//! `flowsync diff`: compare local files with an environment.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use flowsync_core::storage::resolve_target;
use flowsync_sync::{diff_workspace, DiffReport, DiffResult, DiffStatus};

use super::Project;

/// Arguments for `flowsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Environment to compare against (config/<env>.yaml).
    pub env: String,

    /// A category name or a single `.json` file. Omit to compare everything.
    pub target: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DiffArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let project = Project::open(root)?;
        let target = resolve_target(&project.root, &project.layout, self.target.as_deref())?;
        let store = project.connect(&self.env)?;

        let report = diff_workspace(&store, &project.layout, &target)
            .with_context(|| format!("diff against '{}' failed", self.env))?;

        if self.json {
            let json =
                serde_json::to_string_pretty(&report).context("failed to serialize diff report")?;
            println!("{json}");
        } else {
            print_report(&project, &report);
        }

        if !report.failures.is_empty() {
            bail!("{} workflow(s) could not be compared", report.failures.len());
        }
        Ok(())
    }
}

fn print_report(project: &Project, report: &DiffReport) {
    if report.results.is_empty() && report.failures.is_empty() {
        println!("Nothing to compare.");
        return;
    }

    for result in &report.results {
        print_result(project, result);
    }
    for failure in &report.failures {
        println!(
            "{} {}: {}",
            "✗".red(),
            failure.subject.bold().red(),
            failure.reason
        );
    }

    let counts = [
        DiffStatus::Identical,
        DiffStatus::Modified,
        DiffStatus::LocalOnly,
        DiffStatus::RemoteOnly,
    ]
    .iter()
    .map(|status| format!("{} {status}", report.count(*status)))
    .collect::<Vec<_>>()
    .join(", ");
    let summary = format!("{counts}, {} failed", report.failures.len());
    if report.in_sync() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.yellow());
    }
}

fn print_result(project: &Project, result: &DiffResult) {
    let location = result
        .path
        .as_deref()
        .map(|p| project.display_path(p))
        .unwrap_or_default();
    let line = match result.status {
        DiffStatus::Identical => format!("{} {}", "=".green(), result.subject),
        DiffStatus::Modified => format!("{} {}", "~".yellow(), result.subject.bold()),
        DiffStatus::LocalOnly => format!("{} {} (local only)", "+".cyan(), result.subject.bold()),
        DiffStatus::RemoteOnly => {
            format!("{} {} (remote only)", "-".magenta(), result.subject.bold())
        }
    };
    println!("{line} {}", location.bright_black());
    for difference in &result.differences {
        println!("    {difference}");
    }
}
