//! `flowsync deploy`: push local workflow files to an environment.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use flowsync_core::storage::resolve_target;
use flowsync_remote::WorkflowStore;
use flowsync_sync::{deploy_batch, BatchMode, BatchReport, DeployOptions, DeployReport, Outcome};

use super::Project;
use crate::ActivationArg;

/// Arguments for `flowsync deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Environment to deploy to (config/<env>.yaml).
    pub env: String,

    /// A category name or a single `.json` file. Omit to deploy everything.
    pub target: Option<String>,

    /// Load and check every file, but send nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Deploy all files concurrently.
    #[arg(long)]
    pub parallel: bool,

    /// Override the project's activation policy (preserve, new-only, never).
    #[arg(long)]
    pub activation: Option<ActivationArg>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DeployArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let project = Project::open(root)?;
        let target = resolve_target(&project.root, &project.layout, self.target.as_deref())?;
        let files = project
            .layout
            .files_for(&target)
            .context("failed to collect workflow files")?;
        if files.is_empty() {
            println!(
                "No workflow files found under {}",
                project.display_path(&project.layout.workflows_root)
            );
            return Ok(());
        }

        // Dry runs send nothing, so there is no connectivity probe.
        let store = if self.dry_run {
            project.connect(&self.env)?
        } else {
            project.connect_checked(&self.env)?
        };
        let store: Arc<dyn WorkflowStore> = Arc::new(store);

        let options = DeployOptions {
            dry_run: self.dry_run,
            mode: if self.parallel {
                BatchMode::Parallel
            } else {
                BatchMode::Sequential
            },
            activation: self
                .activation
                .map_or(project.config.activation, |arg| arg.0),
        };
        tracing::info!(
            "deploying {} file(s) to '{}' ({:?}, activation {})",
            files.len(),
            self.env,
            options.mode,
            options.activation
        );

        let batch = deploy_batch(store, &files, &options).context("deploy failed")?;

        if self.json {
            let json =
                serde_json::to_string_pretty(&batch).context("failed to serialize deploy report")?;
            println!("{json}");
        } else {
            print_batch(&project, &batch, self.dry_run);
        }

        if !batch.is_success() {
            bail!(
                "{} of {} workflow(s) failed to deploy",
                batch.failure_count(),
                batch.reports.len()
            );
        }
        Ok(())
    }
}

fn print_batch(project: &Project, batch: &BatchReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    for report in &batch.reports {
        print_report(project, report, prefix);
    }

    let deployed = batch
        .reports
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Deployed { .. }))
        .count();
    let failed = batch.failure_count();
    let summary = if dry_run {
        format!(
            "{prefix}{} would deploy, {failed} failed",
            batch.reports.len() - failed
        )
    } else {
        format!("{deployed} deployed, {failed} failed")
    };
    if failed == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

fn print_report(project: &Project, report: &DeployReport, prefix: &str) {
    let subject = report.subject();
    let path = project.display_path(&report.path);
    match &report.outcome {
        Outcome::Deployed {
            action,
            id,
            activated,
        } => {
            let active = if *activated { " active" } else { "" };
            println!(
                "{prefix}✓ {} {action} ({id}){active}",
                subject.bold()
            );
        }
        Outcome::WouldDeploy => {
            println!("{prefix}~  {} {}", subject.bold(), path.bright_black());
        }
        Outcome::Failed { kind, reason } => {
            println!("{prefix}✗ {} [{kind}] {reason}", subject.bold().red());
        }
    }

    for tag in &report.created_tags {
        println!("    + tag \"{tag}\" created");
    }
    for credential in &report.unresolved_credentials {
        println!(
            "    {}",
            format!(
                "! node \"{}\" credential {}: \"{}\" not found, assign it in n8n",
                credential.node, credential.slot, credential.name
            )
            .yellow()
        );
    }
    for note in &report.notes {
        println!("    {}", format!("· {note}").bright_black());
    }
}
