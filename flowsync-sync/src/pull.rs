//! Download remote workflows into category directories.

use std::collections::HashMap;
use std::path::PathBuf;

use flowsync_core::storage::{save_workflow, Layout, WriteResult};
use flowsync_core::types::{determine_category, Category, WorkflowId};
use flowsync_remote::WorkflowStore;

use crate::normalize::normalize;
use crate::SyncError;

/// Why a remote workflow was left out of a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No tag matches a configured category.
    Uncategorized,
    /// Belongs to a category other than the requested one.
    OtherCategory(Category),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulled {
    pub id: WorkflowId,
    pub name: String,
    pub category: Category,
    pub result: WriteResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullFailure {
    pub id: WorkflowId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub pulled: Vec<Pulled>,
    pub skipped: Vec<Skipped>,
    pub failures: Vec<PullFailure>,
}

impl PullReport {
    pub fn written(&self) -> usize {
        self.pulled
            .iter()
            .filter(|p| matches!(p.result, WriteResult::Written { .. }))
            .count()
    }
}

/// Save every categorized remote workflow in canonical form.
///
/// Untagged workflows (and, with `only`, workflows of other categories) are
/// skipped. A failed fetch or write is recorded and the pull continues. Two
/// remote workflows that map to the same file are a failure for the second
/// one rather than a silent overwrite.
pub fn pull(
    store: &dyn WorkflowStore,
    layout: &Layout,
    only: Option<&Category>,
) -> Result<PullReport, SyncError> {
    let catalog = store.list()?;
    tracing::debug!("pull: {} remote workflow(s)", catalog.len());

    let mut report = PullReport::default();
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();

    for summary in &catalog {
        let Some(category) = determine_category(&summary.tag_names(), &layout.categories) else {
            report.skipped.push(Skipped {
                name: summary.name.clone(),
                reason: SkipReason::Uncategorized,
            });
            continue;
        };
        if only.is_some_and(|wanted| wanted != category) {
            report.skipped.push(Skipped {
                name: summary.name.clone(),
                reason: SkipReason::OtherCategory(category.clone()),
            });
            continue;
        }

        let fail = |reason: String| PullFailure {
            id: summary.id.clone(),
            name: summary.name.clone(),
            reason,
        };

        let path = layout.workflow_path(category, &summary.name);
        if let Some(previous) = claimed.get(&path) {
            report.failures.push(fail(format!(
                "{} is already taken by workflow {previous}",
                path.display()
            )));
            continue;
        }

        let record = match store.get(&summary.id) {
            Ok(record) => record,
            Err(err) => {
                report.failures.push(fail(err.to_string()));
                continue;
            }
        };
        let canonical = normalize(&record);
        match save_workflow(layout, category, &canonical) {
            Ok(result) => {
                match &result {
                    WriteResult::Written { path } => {
                        tracing::info!("pulled \"{}\" -> {}", summary.name, path.display())
                    }
                    WriteResult::Unchanged { path } => {
                        tracing::debug!("unchanged: {}", path.display())
                    }
                }
                claimed.insert(path, summary.id.to_string());
                report.pulled.push(Pulled {
                    id: summary.id.clone(),
                    name: summary.name.clone(),
                    category: category.clone(),
                    result,
                });
            }
            Err(err) => report.failures.push(fail(err.to_string())),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use flowsync_core::types::{default_categories, Node, TagRef, Workflow};
    use flowsync_remote::memory::{Fault, Op};
    use flowsync_remote::MemoryStore;
    use tempfile::TempDir;

    use super::*;

    fn tagged(name: &str, tags: &[&str]) -> Workflow {
        let mut wf = Workflow::new(name);
        wf.nodes.push(Node::new("Start", "n8n-nodes-base.manualTrigger"));
        wf.tags = Some(tags.iter().map(|t| TagRef::named(*t)).collect());
        wf
    }

    fn layout(home: &TempDir) -> Layout {
        Layout::new(home.path().join("workflows"), default_categories())
    }

    #[test]
    fn writes_canonical_files_by_category() {
        let home = TempDir::new().expect("home");
        let store = MemoryStore::new();
        store.insert_workflow(tagged("Invoice Sync", &["Business"]));
        store.insert_workflow(tagged("Helper", &["shared", "business"]));

        let report = pull(&store, &layout(&home), None).expect("pull");
        assert_eq!(report.written(), 2);
        let invoice = home.path().join("workflows/business/Invoice_Sync.json");
        let text = std::fs::read_to_string(invoice).expect("read");
        assert!(!text.contains("\"id\""), "canonical files carry no ids: {text}");
        assert!(home.path().join("workflows/business/Helper.json").exists());
    }

    #[test]
    fn second_pull_is_unchanged() {
        let home = TempDir::new().expect("home");
        let store = MemoryStore::new();
        store.insert_workflow(tagged("Invoice", &["business"]));
        pull(&store, &layout(&home), None).expect("first");
        let report = pull(&store, &layout(&home), None).expect("second");
        assert_eq!(report.written(), 0);
        assert!(matches!(report.pulled[0].result, WriteResult::Unchanged { .. }));
    }

    #[test]
    fn filter_skips_untagged_and_other_categories() {
        let home = TempDir::new().expect("home");
        let store = MemoryStore::new();
        store.insert_workflow(tagged("Invoice", &["business"]));
        store.insert_workflow(tagged("Lab", &["experimental"]));
        store.insert_workflow(tagged("Report", &["management"]));

        let business = Category::from("business");
        let report = pull(&store, &layout(&home), Some(&business)).expect("pull");
        assert_eq!(report.pulled.len(), 1);
        assert_eq!(report.pulled[0].name, "Invoice");
        assert_eq!(
            report.skipped,
            vec![
                Skipped {
                    name: "Lab".to_string(),
                    reason: SkipReason::Uncategorized
                },
                Skipped {
                    name: "Report".to_string(),
                    reason: SkipReason::OtherCategory(Category::from("management"))
                },
            ]
        );
        assert!(!home.path().join("workflows/business/Lab.json").exists());
        assert!(!home.path().join("workflows/business/Report.json").exists());
    }

    #[test]
    fn fetch_failure_is_recorded_and_pull_continues() {
        let home = TempDir::new().expect("home");
        let store = MemoryStore::new();
        store.insert_workflow(tagged("Broken", &["business"]));
        store.insert_workflow(tagged("Fine", &["business"]));
        store.inject(Op::Get, Some("Broken"), Fault::Status(500));

        let report = pull(&store, &layout(&home), None).expect("pull");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "Broken");
        assert_eq!(report.pulled.len(), 1);
    }

    #[test]
    fn colliding_file_names_do_not_overwrite() {
        let home = TempDir::new().expect("home");
        let store = MemoryStore::new();
        store.insert_workflow(tagged("a/b", &["business"]));
        store.insert_workflow(tagged("a_b", &["business"]));

        let report = pull(&store, &layout(&home), None).expect("pull");
        assert_eq!(report.pulled.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("already taken"));
    }

    #[test]
    fn list_failure_aborts() {
        let home = TempDir::new().expect("home");
        let store = MemoryStore::new();
        store.inject(Op::List, None, Fault::Transport);
        let err = pull(&store, &layout(&home), None).unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
    }
}
