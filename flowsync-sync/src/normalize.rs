//! Canonical (environment-portable) form of a workflow.
//!
//! [`normalize`] is the only way to build a [`Canonical`]. It is pure and
//! idempotent, and it is applied identically to local files and remote
//! records, so comparing two canonical values is plain equality.

use std::ops::Deref;

use serde::Serialize;

use flowsync_core::storage::render_workflow;
use flowsync_core::types::{CredentialRef, Node, TagRef, Workflow};

/// A workflow with every environment-specific and runtime field removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Canonical(Workflow);

impl Canonical {
    /// Pretty JSON with a trailing newline; the exact bytes stored on disk.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        render_workflow(&self.0)
    }
}

impl Deref for Canonical {
    type Target = Workflow;

    fn deref(&self) -> &Workflow {
        &self.0
    }
}

/// Strip ids, timestamps, version markers, runtime output and sharing data.
///
/// Kept: name, node configuration, connections, settings, tag names.
pub fn normalize(record: &Workflow) -> Canonical {
    Canonical(Workflow {
        id: None,
        name: record.name.clone(),
        active: None,
        nodes: record.nodes.iter().map(normalize_node).collect(),
        connections: record.connections.clone(),
        settings: record.settings.clone(),
        static_data: None,
        tags: normalize_tags(record.tags.as_deref()),
        pin_data: None,
        version_id: None,
        meta: None,
        is_archived: None,
        trigger_count: None,
        shared: None,
        created_at: None,
        updated_at: None,
    })
}

fn normalize_node(node: &Node) -> Node {
    Node {
        id: None,
        name: node.name.clone(),
        node_type: node.node_type.clone(),
        type_version: node.type_version.clone(),
        position: node.position.clone(),
        parameters: node.parameters.clone(),
        credentials: node.credentials.as_ref().map(|slots| {
            slots
                .iter()
                .map(|(slot, credential)| {
                    (
                        slot.clone(),
                        CredentialRef {
                            id: None,
                            name: credential.name.clone(),
                        },
                    )
                })
                .collect()
        }),
        webhook_id: None,
        disabled: node.disabled,
        notes: node.notes.clone(),
        notes_in_flow: node.notes_in_flow,
        data: None,
        issues: None,
        hints: None,
        extra: node.extra.clone(),
    }
}

fn normalize_tags(tags: Option<&[TagRef]>) -> Option<Vec<TagRef>> {
    let names: Vec<TagRef> = tags?
        .iter()
        .map(|tag| TagRef::named(tag.name.clone()))
        .collect();
    (!names.is_empty()).then_some(names)
}
