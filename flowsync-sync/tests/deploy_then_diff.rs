//! Deploy, pull and diff working together against an in-memory service.

use std::path::PathBuf;
use std::sync::Arc;

use flowsync_core::storage::{resolve_target, save_workflow, Layout, Target};
use flowsync_core::types::{default_categories, Category, Node, TagRef, Workflow};
use flowsync_remote::memory::Op;
use flowsync_remote::{MemoryStore, WorkflowStore};
use flowsync_sync::deploy::DeployAction;
use flowsync_sync::{
    deploy_batch, diff_workspace, pull, BatchMode, DeployOptions, DiffStatus, Outcome,
};
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn layout(home: &TempDir) -> Layout {
    Layout::new(home.path().join("workflows"), default_categories())
}

fn invoice() -> Workflow {
    let mut wf = Workflow::new("Invoice");
    let mut fetch = Node::new("Fetch", "n8n-nodes-base.httpRequest");
    fetch
        .parameters
        .insert("url".to_string(), json!("https://billing.example.com/invoices"));
    wf.nodes = vec![
        Node::new("Start", "n8n-nodes-base.scheduleTrigger"),
        fetch,
        Node::new("Send", "n8n-nodes-base.emailSend"),
    ];
    wf.connections.insert(
        "Start".to_string(),
        json!({"main": [[{"node": "Fetch", "type": "main", "index": 0}]]}),
    );
    wf.tags = Some(vec![TagRef::named("business")]);
    wf
}

fn save(home: &TempDir, category: &str, wf: &Workflow) -> PathBuf {
    save_workflow(&layout(home), &Category::from(category), wf)
        .expect("save")
        .path()
        .to_path_buf()
}

#[rstest]
#[case::sequential(BatchMode::Sequential)]
#[case::parallel(BatchMode::Parallel)]
fn deploying_unchanged_source_twice_leaves_nothing_to_diff(#[case] mode: BatchMode) {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = Arc::new(MemoryStore::new());
    let files = vec![save(&home, "business", &invoice())];
    let options = DeployOptions {
        mode,
        ..DeployOptions::default()
    };

    let first = deploy_batch(store.clone(), &files, &options).expect("first");
    assert!(first.is_success());
    store.clear_calls();
    let second = deploy_batch(store.clone(), &files, &options).expect("second");
    assert!(matches!(
        second.reports[0].outcome,
        Outcome::Deployed {
            action: DeployAction::Updated,
            ..
        }
    ));
    assert_eq!(store.count(Op::Create), 0);
    assert_eq!(store.count(Op::CreateTag), 0);
    assert_eq!(store.count(Op::Update), 1);

    let report = diff_workspace(store.as_ref(), &layout(&home), &Target::All).expect("diff");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].status, DiffStatus::Identical);
    assert!(report.results[0].differences.is_empty());
    assert!(report.in_sync());
    assert_eq!(store.workflows().len(), 1);
}

#[test]
fn workflow_deleted_remotely_shows_as_local_only_and_is_created_again() {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = Arc::new(MemoryStore::new());
    let files = vec![save(&home, "business", &invoice())];

    let first = deploy_batch(store.clone(), &files, &DeployOptions::default()).expect("first");
    let Outcome::Deployed { id: first_id, .. } = first.reports[0].outcome.clone() else {
        panic!("expected deployed, got {:?}", first.reports[0].outcome);
    };
    store.remove_workflow(&first_id).expect("deployed record");

    let report = diff_workspace(store.as_ref(), &layout(&home), &Target::All).expect("diff");
    assert_eq!(report.count(DiffStatus::LocalOnly), 1);

    let again = deploy_batch(store.clone(), &files, &DeployOptions::default()).expect("again");
    let Outcome::Deployed { action, id, .. } = again.reports[0].outcome.clone() else {
        panic!("expected deployed, got {:?}", again.reports[0].outcome);
    };
    assert_eq!(action, DeployAction::Created);
    assert_ne!(id, first_id);
    assert_eq!(store.workflows().len(), 1);
}

#[test]
fn pull_then_diff_is_identical() {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = MemoryStore::new();
    let mut remote = invoice();
    remote.nodes[1].webhook_id = Some("hook".to_string());
    remote.version_id = Some("v7".to_string());
    store.insert_workflow(remote);

    let pulled = pull(&store, &layout(&home), None).expect("pull");
    assert_eq!(pulled.written(), 1);

    let report = diff_workspace(&store, &layout(&home), &Target::All).expect("diff");
    assert_eq!(report.results[0].status, DiffStatus::Identical, "{report:?}");
}

#[test]
fn renamed_node_scenario() {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = MemoryStore::new();

    let mut remote = invoice();
    remote.nodes[2].name = "Send Email".to_string();
    remote.nodes.push(Node::new("Archive", "n8n-nodes-base.googleDrive"));
    store.insert_workflow(remote);
    save(&home, "business", &invoice());

    let report = diff_workspace(&store, &layout(&home), &Target::All).expect("diff");
    let result = &report.results[0];
    assert_eq!(result.status, DiffStatus::Modified);
    assert!(result.differences.contains(&"Nodes: 3 vs 4".to_string()));
    assert!(result
        .differences
        .contains(&"Node added locally: \"Send\"".to_string()));
    assert!(result
        .differences
        .contains(&"Node added remotely: \"Send Email\"".to_string()));
    assert!(result
        .path
        .as_ref()
        .is_some_and(|p| p.ends_with("business/Invoice.json")));
}

#[test]
fn uncategorized_remote_workflows_stay_invisible() {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = MemoryStore::new();
    let mut lab = invoice();
    lab.name = "Lab".to_string();
    lab.tags = Some(vec![TagRef::named("experimental")]);
    store.insert_workflow(lab);
    let mut report_wf = invoice();
    report_wf.name = "Monthly Report".to_string();
    report_wf.tags = Some(vec![TagRef::named("management")]);
    store.insert_workflow(report_wf);

    let business = Category::from("business");
    let pulled = pull(&store, &layout(&home), Some(&business)).expect("pull");
    assert!(pulled.pulled.is_empty());

    let target = resolve_target(home.path(), &layout(&home), Some("business")).expect("target");
    let report = diff_workspace(&store, &layout(&home), &target).expect("diff");
    assert!(report.results.is_empty(), "{report:?}");

    let everything = diff_workspace(&store, &layout(&home), &Target::All).expect("diff");
    let subjects: Vec<_> = everything.results.iter().map(|r| r.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Monthly Report"]);
    assert_eq!(everything.results[0].status, DiffStatus::RemoteOnly);
    assert_eq!(
        everything.results[0].differences[0],
        "Category: management".to_string()
    );
}

#[test]
fn local_only_and_failures_are_separated() {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = MemoryStore::new();
    save(&home, "business", &invoice());
    let broken = home.path().join("workflows/shared/broken.json");
    std::fs::create_dir_all(broken.parent().expect("parent")).expect("mkdir");
    std::fs::write(&broken, "not json").expect("write");

    let report = diff_workspace(&store, &layout(&home), &Target::All).expect("diff");
    assert_eq!(report.count(DiffStatus::LocalOnly), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path.as_deref(), Some(broken.as_path()));
    assert!(!report.in_sync());
}

#[test]
fn single_file_target_skips_remote_only_pass() {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = MemoryStore::new();
    let mut other = invoice();
    other.name = "Other".to_string();
    store.insert_workflow(other);
    let path = save(&home, "business", &invoice());

    let report =
        diff_workspace(&store, &layout(&home), &Target::File(path)).expect("diff");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].status, DiffStatus::LocalOnly);
}

#[test]
fn dry_run_batch_makes_no_calls() {
    init_logging();
    let home = TempDir::new().expect("home");
    let store = Arc::new(MemoryStore::new());
    let files = vec![save(&home, "business", &invoice())];
    let options = DeployOptions {
        dry_run: true,
        ..DeployOptions::default()
    };
    let batch = deploy_batch(store.clone(), &files, &options).expect("batch");
    assert_eq!(batch.reports[0].outcome, Outcome::WouldDeploy);
    assert!(store.calls().is_empty());
    assert_eq!(store.count(Op::List), 0);
    assert!(store.list().expect("list").is_empty());
}
