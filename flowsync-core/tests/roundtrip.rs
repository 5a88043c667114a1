//! Serialisation roundtrip tests for workflow records.
//!
//! Each `#[case]` is a self-contained JSON document.

use flowsync_core::storage::render_workflow;
use flowsync_core::types::{Workflow, WorkflowSummary};
use rstest::rstest;
use serde_json::Value;

#[rstest]
#[case::minimal(r#"{"name":"a","nodes":[],"connections":{}}"#)]
#[case::with_settings(
    r#"{"name":"a","nodes":[],"connections":{},"settings":{"executionOrder":"v1"}}"#
)]
#[case::node_extras(
    r#"{"name":"a","connections":{},"nodes":[{"name":"N","type":"t","typeVersion":2.1,"position":[0,-40],"parameters":{"x":[1,2]},"alwaysOutputData":true}]}"#
)]
#[case::credentials(
    r#"{"name":"a","connections":{},"nodes":[{"name":"N","type":"t","parameters":{},"credentials":{"slackApi":{"id":"7","name":"Slack"}}}]}"#
)]
#[case::remote_record(
    r#"{"id":"12","name":"a","active":true,"nodes":[],"connections":{},"versionId":"v","createdAt":"2024-01-02T03:04:05Z","tags":[{"id":"t1","name":"business"}]}"#
)]
fn workflow_json_roundtrips(#[case] raw: &str) {
    let original: Value = serde_json::from_str(raw).expect("raw json");
    let workflow: Workflow = serde_json::from_str(raw).expect("workflow");
    let rendered = render_workflow(&workflow).expect("render");
    let back: Value = serde_json::from_str(&rendered).expect("rendered json");
    assert_eq!(back, original);
}

#[rstest]
#[case::no_tags(r#"{"id":"1","name":"a"}"#, 0)]
#[case::two_tags(r#"{"id":"1","name":"a","tags":[{"id":"x","name":"b"},{"id":"y","name":"c"}]}"#, 2)]
fn summary_parses_tags(#[case] raw: &str, #[case] tags: usize) {
    let summary: WorkflowSummary = serde_json::from_str(raw).expect("summary");
    assert_eq!(summary.tags.len(), tags);
}
