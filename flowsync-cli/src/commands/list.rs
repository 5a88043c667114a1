//! `flowsync list`: local workflows by category, optionally the remote catalog.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use flowsync_core::storage::load_workflow;
use flowsync_core::WorkflowSummary;
use flowsync_remote::WorkflowStore;

use super::Project;

/// Arguments for `flowsync list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also list the workflows present in this environment.
    #[arg(long, value_name = "ENV")]
    pub remote: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct LocalRow {
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "nodes")]
    nodes: usize,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "file")]
    file: String,
}

#[derive(Debug, Serialize, Tabled)]
struct RemoteRow {
    #[tabled(rename = "active")]
    active: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "tags")]
    tags: String,
    #[tabled(rename = "updated")]
    updated: String,
}

#[derive(Serialize)]
struct ListJson {
    local: Vec<LocalRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<Vec<RemoteRow>>,
}

impl ListArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let project = Project::open(root)?;
        let local = local_rows(&project)?;

        let remote = match self.remote.as_deref() {
            Some(env) => {
                let store = project.connect(env)?;
                let catalog = store
                    .list()
                    .with_context(|| format!("failed to list workflows in '{env}'"))?;
                Some(catalog.iter().map(remote_row).collect::<Vec<_>>())
            }
            None => None,
        };

        if self.json {
            let payload = ListJson { local, remote };
            let json =
                serde_json::to_string_pretty(&payload).context("failed to serialize listing")?;
            println!("{json}");
            return Ok(());
        }

        if local.is_empty() {
            println!(
                "No workflow files found under {}",
                project.display_path(&project.layout.workflows_root)
            );
        } else {
            let count = local.len();
            let mut table = Table::new(local);
            table.with(Style::rounded());
            println!("{table}");
            println!("{}", format!("{count} local workflow(s)").bright_black());
        }

        if let (Some(env), Some(rows)) = (self.remote.as_deref(), remote) {
            println!();
            println!("{} {}", "Remote:".bold(), env);
            let count = rows.len();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
            println!("{}", format!("{count} remote workflow(s)").bright_black());
        }
        Ok(())
    }
}

fn local_rows(project: &Project) -> Result<Vec<LocalRow>> {
    let mut rows = Vec::new();
    for category in &project.layout.categories {
        let files = project
            .layout
            .find_workflow_files(Some(category))
            .with_context(|| format!("failed to scan category '{category}'"))?;
        for path in files {
            let file = project.display_path(&path);
            let row = match load_workflow(&path) {
                Ok(workflow) => LocalRow {
                    category: category.to_string(),
                    name: workflow.name,
                    nodes: workflow.nodes.len(),
                    id: workflow
                        .id
                        .map_or_else(|| "-".to_string(), |id| id.to_string()),
                    file,
                },
                Err(err) => {
                    tracing::warn!("{err}");
                    LocalRow {
                        category: category.to_string(),
                        name: "(invalid)".to_string(),
                        nodes: 0,
                        id: "-".to_string(),
                        file,
                    }
                }
            };
            rows.push(row);
        }
    }
    Ok(rows)
}

fn remote_row(summary: &WorkflowSummary) -> RemoteRow {
    RemoteRow {
        active: if summary.active { "●" } else { "○" }.to_string(),
        id: summary.id.to_string(),
        name: summary.name.clone(),
        tags: summary.tag_names().join(", "),
        updated: summary
            .updated_at
            .map_or_else(|| "-".to_string(), format_timestamp),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
