//! Deployment orchestrator.
//!
//! ## Per-file state machine
//!
//! ```text
//! Load ─┬─ invalid ───────────────────────────────────────────▶ Failed{validation}
//!       ├─ dry run ───────────────────────────────────────────▶ WouldDeploy
//!       └─ Lookup ─┬─ Existing ─▶ reconcile ─▶ Update ─┬─ ok ──▶ Tags ─▶ Deployed{updated}
//!                  │                                   └─ 404 ─┐
//!                  ├─ Vanished ────────────────────────────────┤
//!                  └─ Missing ─────────────────────────────────┴─▶ Create ─▶ Tags ─▶ [Activate] ─▶ Deployed{created}
//! ```
//!
//! Any remote failure after Load ends the file in `Failed{remote|transport}`.
//! Files never affect each other: a batch always produces one report per
//! input file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use flowsync_core::config::ActivationPolicy;
use flowsync_core::storage::load_workflow;
use flowsync_core::types::{Workflow, WorkflowId, WorkflowPayload};
use flowsync_remote::{RemoteError, WorkflowStore};

use crate::normalize::{normalize, Canonical};
use crate::reconcile::{reconcile, unresolved_on_create, UnresolvedCredential};
use crate::tags::{resolve_with_store, SharedTagCatalog, TagResolution};
use crate::SyncError;

// ---------------------------------------------------------------------------
// Options and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// One file at a time, in input order.
    #[default]
    Sequential,
    /// All files at once on a worker pool.
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeployOptions {
    pub dry_run: bool,
    pub mode: BatchMode,
    pub activation: ActivationPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployAction {
    Created,
    Updated,
}

impl fmt::Display for DeployAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployAction::Created => write!(f, "created"),
            DeployAction::Updated => write!(f, "updated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Malformed or schema-invalid file; the remote was never contacted.
    Validation,
    /// The service answered with an error.
    Remote,
    /// The service could not be reached.
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Validation => write!(f, "validation"),
            FailureKind::Remote => write!(f, "remote"),
            FailureKind::Transport => write!(f, "transport"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum Outcome {
    Deployed {
        action: DeployAction,
        id: WorkflowId,
        activated: bool,
    },
    WouldDeploy,
    Failed {
        kind: FailureKind,
        reason: String,
    },
}

impl Outcome {
    fn from_remote(err: &RemoteError) -> Self {
        Outcome::Failed {
            kind: if err.is_transport() {
                FailureKind::Transport
            } else {
                FailureKind::Remote
            },
            reason: err.to_string(),
        }
    }
}

/// What happened to one workflow file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub path: PathBuf,
    /// Known once the file has loaded.
    pub name: Option<String>,
    pub outcome: Outcome,
    pub notes: Vec<String>,
    pub created_tags: Vec<String>,
    pub unresolved_credentials: Vec<UnresolvedCredential>,
}

impl DeployReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            name: None,
            outcome: Outcome::WouldDeploy,
            notes: Vec::new(),
            created_tags: Vec::new(),
            unresolved_credentials: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    /// Workflow name if loaded, otherwise the file path.
    pub fn subject(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Reports for a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub reports: Vec<DeployReport>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &DeployReport> {
        self.reports.iter().filter(|r| r.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Per-file pipeline
// ---------------------------------------------------------------------------

/// Result of looking a workflow up by name.
#[derive(Debug)]
enum Lookup {
    Existing { id: WorkflowId, record: Workflow },
    Missing,
    /// Listed under this name but gone by the time it was fetched.
    Vanished(WorkflowId),
}

fn lookup(store: &dyn WorkflowStore, name: &str) -> Result<Lookup, RemoteError> {
    let catalog = store.list()?;
    let Some(summary) = catalog.into_iter().find(|s| s.name == name) else {
        return Ok(Lookup::Missing);
    };
    match store.get(&summary.id) {
        Ok(record) => Ok(Lookup::Existing {
            id: summary.id,
            record,
        }),
        Err(err) if err.is_not_found() => Ok(Lookup::Vanished(summary.id)),
        Err(err) => Err(err),
    }
}

enum TagSource<'a> {
    PerFile,
    Shared(&'a SharedTagCatalog),
}

impl TagSource<'_> {
    fn resolve(
        &self,
        store: &dyn WorkflowStore,
        desired: &[&str],
    ) -> Result<TagResolution, RemoteError> {
        match self {
            TagSource::PerFile => resolve_with_store(store, desired),
            TagSource::Shared(catalog) => catalog.resolve(store, desired),
        }
    }
}

/// Deploy one workflow file, resolving tags with a fresh catalog.
pub fn deploy_file(store: &dyn WorkflowStore, path: &Path, options: &DeployOptions) -> DeployReport {
    Pipeline {
        store,
        options,
        tags: &TagSource::PerFile,
    }
    .run(path)
}

struct Pipeline<'a> {
    store: &'a dyn WorkflowStore,
    options: &'a DeployOptions,
    tags: &'a TagSource<'a>,
}

impl Pipeline<'_> {
    fn run(&self, path: &Path) -> DeployReport {
        let mut report = DeployReport::new(path);

        let source = match load_workflow(path) {
            Ok(source) => source,
            Err(err) => {
                tracing::debug!("{}: {err}", path.display());
                report.outcome = Outcome::Failed {
                    kind: FailureKind::Validation,
                    reason: err.to_string(),
                };
                return report;
            }
        };
        report.name = Some(source.name.clone());

        if self.options.dry_run {
            tracing::info!("[dry-run] would deploy \"{}\"", source.name);
            report.outcome = Outcome::WouldDeploy;
            return report;
        }

        report.outcome = match self.deploy(&source, &mut report) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!("\"{}\" failed: {err}", source.name);
                Outcome::from_remote(&err)
            }
        };
        report
    }

    fn deploy(&self, source: &Workflow, report: &mut DeployReport) -> Result<Outcome, RemoteError> {
        let canonical = normalize(source);

        let (id, recreated) = match lookup(self.store, &canonical.name)? {
            Lookup::Existing { id, record } => {
                let reconciled = reconcile(&canonical, &record);
                if !reconciled.new_nodes.is_empty() {
                    tracing::debug!("new nodes in \"{}\": {:?}", canonical.name, reconciled.new_nodes);
                }
                report.unresolved_credentials = reconciled.unresolved_credentials;

                match self.store.update(&id, &payload_for(&reconciled.workflow, source)) {
                    Ok(_) => {
                        tracing::info!("updated \"{}\" ({id})", canonical.name);
                        self.apply_tags(&canonical, report, &id, DeployAction::Updated)?;
                        return Ok(Outcome::Deployed {
                            action: DeployAction::Updated,
                            id,
                            activated: false,
                        });
                    }
                    Err(err) if err.is_not_found() => {
                        tracing::warn!("\"{}\" ({id}) vanished during update; recreating", canonical.name);
                        report
                            .notes
                            .push(format!("recreated: remote workflow {id} no longer exists"));
                        (self.create(&canonical, source, report)?, true)
                    }
                    Err(err) => return Err(err),
                }
            }
            Lookup::Vanished(old) => {
                tracing::warn!("\"{}\" ({old}) vanished before fetch; recreating", canonical.name);
                report
                    .notes
                    .push(format!("recreated: remote workflow {old} no longer exists"));
                (self.create(&canonical, source, report)?, true)
            }
            Lookup::Missing => (self.create(&canonical, source, report)?, false),
        };

        self.apply_tags(&canonical, report, &id, DeployAction::Created)?;

        let activated = self
            .options
            .activation
            .should_activate(source.is_active(), recreated);
        if activated {
            if let Err(err) = self.store.activate(&id) {
                report
                    .notes
                    .push(format!("created as {id} but activation failed"));
                return Err(err);
            }
            tracing::info!("activated \"{}\" ({id})", canonical.name);
        } else {
            report
                .notes
                .push("inactive, verify before activation".to_string());
        }

        Ok(Outcome::Deployed {
            action: DeployAction::Created,
            id,
            activated,
        })
    }

    /// Submit a create. The payload never carries `active`, so the service
    /// always starts the new workflow inactive.
    fn create(
        &self,
        canonical: &Canonical,
        source: &Workflow,
        report: &mut DeployReport,
    ) -> Result<WorkflowId, RemoteError> {
        let created = self.store.create(&payload_for(canonical, source))?;
        let id = created.id.ok_or_else(|| RemoteError::Api {
            status: 200,
            body: "create response carried no workflow id".to_string(),
        })?;
        tracing::info!("created \"{}\" ({id})", canonical.name);
        report.unresolved_credentials = unresolved_on_create(canonical);
        Ok(id)
    }

    fn apply_tags(
        &self,
        canonical: &Canonical,
        report: &mut DeployReport,
        id: &WorkflowId,
        action: DeployAction,
    ) -> Result<(), RemoteError> {
        let desired = canonical.tag_names();
        if desired.is_empty() {
            return Ok(());
        }
        let resolution = self.tags.resolve(self.store, &desired);
        let applied = resolution.and_then(|resolution| {
            report.created_tags = resolution.created.iter().map(|t| t.name.clone()).collect();
            self.store.set_tags(id, &resolution.ids)
        });
        if applied.is_err() {
            report
                .notes
                .push(format!("workflow {id} was {action} but its tags were not applied"));
        }
        applied
    }
}

/// Request body for `workflow`. `staticData` is not part of the canonical
/// form, so it comes from the file as loaded.
fn payload_for(workflow: &Workflow, source: &Workflow) -> WorkflowPayload {
    let mut payload = workflow.to_payload();
    payload.static_data = source.static_data.clone();
    payload
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Deploy `files` in the configured mode.
///
/// Only infrastructure problems (the worker runtime failing to start) are
/// errors; every per-file problem is a failed report.
pub fn deploy_batch(
    store: Arc<dyn WorkflowStore>,
    files: &[PathBuf],
    options: &DeployOptions,
) -> Result<BatchReport, SyncError> {
    match options.mode {
        BatchMode::Sequential => Ok(BatchReport {
            reports: files
                .iter()
                .map(|path| deploy_file(store.as_ref(), path, options))
                .collect(),
        }),
        BatchMode::Parallel => deploy_parallel(store, files, options),
    }
}

fn deploy_parallel(
    store: Arc<dyn WorkflowStore>,
    files: &[PathBuf],
    options: &DeployOptions,
) -> Result<BatchReport, SyncError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(SyncError::Runtime)?;

    let log: Arc<Mutex<Vec<(usize, DeployReport)>>> = Arc::default();
    let catalog = Arc::new(SharedTagCatalog::new());

    runtime.block_on(async {
        let mut handles = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            let store = Arc::clone(&store);
            let log = Arc::clone(&log);
            let catalog = Arc::clone(&catalog);
            let options = *options;
            let worker_path = path.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let tags = TagSource::Shared(catalog.as_ref());
                let report = Pipeline {
                    store: store.as_ref(),
                    options: &options,
                    tags: &tags,
                }
                .run(&worker_path);
                log.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push((index, report));
            });
            handles.push((index, path, handle));
        }

        for (index, path, handle) in handles {
            if let Err(err) = handle.await {
                tracing::warn!("worker for {} stopped: {err}", path.display());
                let mut report = DeployReport::new(path);
                report.outcome = Outcome::Failed {
                    kind: FailureKind::Remote,
                    reason: format!("deploy worker panicked: {err}"),
                };
                log.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push((index, report));
            }
        }
    });

    let mut entries = std::mem::take(&mut *log.lock().unwrap_or_else(|p| p.into_inner()));
    entries.sort_by_key(|(index, _)| *index);
    Ok(BatchReport {
        reports: entries.into_iter().map(|(_, report)| report).collect(),
    })
}
