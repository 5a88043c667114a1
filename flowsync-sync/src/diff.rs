//! Structural comparison of local and remote workflows for `flowsync diff`.
//!
//! Both sides are normalized first, so a workflow compared with itself is
//! always [`DiffStatus::Identical`] wherever it came from. The comparison is
//! a fixed checklist (name, node set, per-node type/disabled/parameters/
//! credentials, connections, settings, tags), not a general JSON diff.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Map;

use flowsync_core::storage::{load_workflow, Layout, Target};
use flowsync_core::types::{determine_category, Category, Node, Workflow, WorkflowSummary};
use flowsync_remote::WorkflowStore;

use crate::normalize::{normalize, Canonical};
use crate::SyncError;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffStatus {
    Identical,
    Modified,
    LocalOnly,
    RemoteOnly,
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffStatus::Identical => write!(f, "identical"),
            DiffStatus::Modified => write!(f, "modified"),
            DiffStatus::LocalOnly => write!(f, "local-only"),
            DiffStatus::RemoteOnly => write!(f, "remote-only"),
        }
    }
}

/// Relationship between one local file and its remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub subject: String,
    pub status: DiffStatus,
    pub differences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// A file or remote record that could not be compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffFailure {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// Everything `diff_workspace` found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub results: Vec<DiffResult>,
    pub failures: Vec<DiffFailure>,
}

impl DiffReport {
    pub fn count(&self, status: DiffStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// True when every result is identical and nothing failed.
    pub fn in_sync(&self) -> bool {
        self.failures.is_empty()
            && self
                .results
                .iter()
                .all(|r| r.status == DiffStatus::Identical)
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Itemized differences between two canonical workflows, in a fixed order.
pub fn compare(local: &Canonical, remote: &Canonical) -> Vec<String> {
    let mut differences = Vec::new();

    if local.name != remote.name {
        differences.push(format!("Name: \"{}\" vs \"{}\"", local.name, remote.name));
    }
    if local.nodes.len() != remote.nodes.len() {
        differences.push(format!(
            "Nodes: {} vs {}",
            local.nodes.len(),
            remote.nodes.len()
        ));
    }

    let local_names: HashSet<&str> = local.nodes.iter().map(|n| n.name.as_str()).collect();
    let remote_names: HashSet<&str> = remote.nodes.iter().map(|n| n.name.as_str()).collect();
    for node in local.nodes.iter().filter(|n| !remote_names.contains(n.name.as_str())) {
        differences.push(format!("Node added locally: \"{}\"", node.name));
    }
    for node in remote.nodes.iter().filter(|n| !local_names.contains(n.name.as_str())) {
        differences.push(format!("Node added remotely: \"{}\"", node.name));
    }

    for local_node in &local.nodes {
        if let Some(remote_node) = remote.node(&local_node.name) {
            compare_nodes(local_node, remote_node, &mut differences);
        }
    }

    if local.connections != remote.connections {
        differences.push("Connections differ".to_string());
    }
    let empty = Map::new();
    let local_settings = local.settings.as_ref().unwrap_or(&empty);
    let remote_settings = remote.settings.as_ref().unwrap_or(&empty);
    if local_settings != remote_settings {
        differences.push("Settings differ".to_string());
    }

    let local_tags = sorted_tags(local);
    let remote_tags = sorted_tags(remote);
    if local_tags != remote_tags {
        differences.push(format!(
            "Tags: [{}] vs [{}]",
            local_tags.join(", "),
            remote_tags.join(", ")
        ));
    }
    differences
}

fn compare_nodes(local: &Node, remote: &Node, differences: &mut Vec<String>) {
    let name = &local.name;
    if local.node_type != remote.node_type {
        differences.push(format!(
            "Node \"{name}\" type: {} vs {}",
            local.node_type, remote.node_type
        ));
    }
    if local.is_disabled() != remote.is_disabled() {
        differences.push(format!(
            "Node \"{name}\" disabled: {} vs {}",
            local.is_disabled(),
            remote.is_disabled()
        ));
    }
    if local.parameters != remote.parameters {
        differences.push(format!("Node \"{name}\" parameters differ"));
    }
    if local.credentials.as_ref().filter(|c| !c.is_empty())
        != remote.credentials.as_ref().filter(|c| !c.is_empty())
    {
        differences.push(format!("Node \"{name}\" credentials differ"));
    }
}

fn sorted_tags(workflow: &Workflow) -> Vec<&str> {
    let mut names: Vec<&str> = workflow.tag_names();
    names.sort_unstable();
    names.dedup();
    names
}

/// Compare a local definition with the remote record of the same name.
///
/// `None` on the remote side means no such record exists.
pub fn diff(local: &Workflow, remote: Option<&Workflow>) -> DiffResult {
    let local = normalize(local);
    let Some(remote) = remote else {
        return DiffResult {
            subject: local.name.clone(),
            status: DiffStatus::LocalOnly,
            differences: Vec::new(),
            path: None,
        };
    };
    let differences = compare(&local, &normalize(remote));
    let status = if differences.is_empty() {
        DiffStatus::Identical
    } else {
        DiffStatus::Modified
    };
    DiffResult {
        subject: local.name.clone(),
        status,
        differences,
        path: None,
    }
}

/// Result entry for a remote workflow with no local file.
pub fn remote_only(summary: &WorkflowSummary, category: &Category) -> DiffResult {
    DiffResult {
        subject: summary.name.clone(),
        status: DiffStatus::RemoteOnly,
        differences: vec![format!("Category: {category}"), format!("ID: {}", summary.id)],
        path: None,
    }
}

// ---------------------------------------------------------------------------
// Workspace diff
// ---------------------------------------------------------------------------

/// Diff every file selected by `target` against one environment.
///
/// The remote catalog is listed once; a failure there aborts the command.
/// Failures on individual files or records are collected in
/// [`DiffReport::failures`] and the remaining files are still compared.
pub fn diff_workspace(
    store: &dyn WorkflowStore,
    layout: &Layout,
    target: &Target,
) -> Result<DiffReport, SyncError> {
    let files = layout.files_for(target)?;
    let catalog = store.list()?;
    tracing::debug!("diffing {} file(s) against {} remote workflow(s)", files.len(), catalog.len());

    let mut report = DiffReport::default();
    let mut local_names: HashSet<String> = HashSet::new();

    for path in files {
        let local = match load_workflow(&path) {
            Ok(local) => local,
            Err(err) => {
                report.failures.push(DiffFailure {
                    subject: path.display().to_string(),
                    path: Some(path),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        local_names.insert(local.name.clone());

        let remote = match catalog.iter().find(|s| s.name == local.name) {
            None => None,
            Some(summary) => match store.get(&summary.id) {
                Ok(record) => Some(record),
                Err(err) if err.is_not_found() => {
                    tracing::warn!(
                        "workflow \"{}\" ({}) vanished between list and fetch",
                        summary.name,
                        summary.id
                    );
                    None
                }
                Err(err) => {
                    report.failures.push(DiffFailure {
                        subject: local.name.clone(),
                        path: Some(path),
                        reason: err.to_string(),
                    });
                    continue;
                }
            },
        };

        let mut result = diff(&local, remote.as_ref());
        result.path = Some(path);
        report.results.push(result);
    }

    if matches!(target, Target::File(_)) {
        return Ok(report);
    }

    for summary in &catalog {
        if local_names.contains(&summary.name) {
            continue;
        }
        let Some(category) = determine_category(&summary.tag_names(), &layout.categories) else {
            continue;
        };
        if let Target::Category(wanted) = target {
            if wanted != category {
                continue;
            }
        }
        report.results.push(remote_only(summary, category));
    }
    Ok(report)
}
