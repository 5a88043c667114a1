//! Identity reconciliation.
//!
//! Copies environment-specific identifiers from an existing remote record
//! onto a portable source definition so the result can be submitted as an
//! update. Matching is by name only: workflow by name (done by the caller),
//! node by name, credential by slot and name.

use std::collections::HashMap;

use serde::Serialize;

use flowsync_core::types::{CredentialRef, Node, Workflow};

/// A credential reference with no id in the target environment.
///
/// The deploy still goes ahead; someone has to wire the credential up by
/// hand afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedCredential {
    pub node: String,
    pub slot: String,
    pub name: String,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub workflow: Workflow,
    /// Source nodes with no remote counterpart, in source order.
    pub new_nodes: Vec<String>,
    pub unresolved_credentials: Vec<UnresolvedCredential>,
}

/// Merge the ids of `existing` into a copy of `source`.
///
/// Never invents an id: a source node or credential with no remote match
/// leaves the reconciled copy without one.
pub fn reconcile(source: &Workflow, existing: &Workflow) -> Reconciled {
    let mut workflow = source.clone();
    workflow.id = existing.id.clone();

    let remote_nodes: HashMap<&str, &Node> = existing
        .nodes
        .iter()
        .map(|node| (node.name.as_str(), node))
        .collect();

    let mut new_nodes = Vec::new();
    let mut unresolved_credentials = Vec::new();

    for node in &mut workflow.nodes {
        let remote = remote_nodes.get(node.name.as_str()).copied();
        match remote {
            Some(remote) => {
                node.id = remote.id.clone();
                node.webhook_id = remote.webhook_id.clone().or(node.webhook_id.take());
            }
            None => {
                node.id = None;
                node.webhook_id = None;
                new_nodes.push(node.name.clone());
            }
        }

        let Some(slots) = node.credentials.as_mut() else {
            continue;
        };
        for (slot, credential) in slots.iter_mut() {
            credential.id = remote
                .and_then(|remote| matching_credential(remote, slot, &credential.name))
                .and_then(|matched| matched.id.clone());
            if credential.id.is_none() {
                unresolved_credentials.push(UnresolvedCredential {
                    node: node.name.clone(),
                    slot: slot.clone(),
                    name: credential.name.clone(),
                });
            }
        }
    }

    Reconciled {
        workflow,
        new_nodes,
        unresolved_credentials,
    }
}

fn matching_credential<'a>(remote: &'a Node, slot: &str, name: &str) -> Option<&'a CredentialRef> {
    remote
        .credentials
        .as_ref()?
        .get(slot)
        .filter(|credential| credential.name == name)
}

/// Every credential reference in a workflow that is about to be created.
///
/// A brand-new remote workflow has nothing to reconcile against, so all of
/// its credential references start out unresolved.
pub fn unresolved_on_create(workflow: &Workflow) -> Vec<UnresolvedCredential> {
    workflow
        .nodes
        .iter()
        .flat_map(|node| {
            node.credentials.iter().flatten().map(|(slot, credential)| {
                UnresolvedCredential {
                    node: node.name.clone(),
                    slot: slot.clone(),
                    name: credential.name.clone(),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use flowsync_core::types::WorkflowId;

    use super::*;

    fn node(name: &str, id: Option<&str>) -> Node {
        let mut node = Node::new(name, "n8n-nodes-base.set");
        node.id = id.map(str::to_owned);
        node
    }

    fn with_credential(mut node: Node, slot: &str, name: &str, id: Option<&str>) -> Node {
        node.credentials = Some(BTreeMap::from([(
            slot.to_string(),
            CredentialRef {
                id: id.map(str::to_owned),
                name: name.to_string(),
            },
        )]));
        node
    }

    fn workflow(id: Option<&str>, nodes: Vec<Node>) -> Workflow {
        let mut wf = Workflow::new("Invoice");
        wf.id = id.map(WorkflowId::from);
        wf.nodes = nodes;
        wf
    }

    #[test]
    fn copies_workflow_and_matching_node_ids() {
        let source = workflow(None, vec![node("A", None), node("B", None)]);
        let mut remote_a = node("A", Some("n1"));
        remote_a.webhook_id = Some("hook-a".to_string());
        let existing = workflow(Some("42"), vec![remote_a, node("Z", Some("n9"))]);

        let out = reconcile(&source, &existing);
        assert_eq!(out.workflow.id, Some(WorkflowId::from("42")));
        assert_eq!(out.workflow.nodes[0].id.as_deref(), Some("n1"));
        assert_eq!(out.workflow.nodes[0].webhook_id.as_deref(), Some("hook-a"));
        assert_eq!(out.workflow.nodes[1].id, None);
        assert_eq!(out.new_nodes, vec!["B".to_string()]);
    }

    #[test]
    fn never_keeps_stale_ids_on_new_nodes() {
        let source = workflow(Some("old"), vec![node("B", Some("stale"))]);
        let existing = workflow(Some("42"), vec![]);
        let out = reconcile(&source, &existing);
        assert_eq!(out.workflow.nodes[0].id, None);
        assert_eq!(out.workflow.id, Some(WorkflowId::from("42")));
    }

    #[test]
    fn remote_only_nodes_are_not_added() {
        let source = workflow(None, vec![node("A", None)]);
        let existing = workflow(Some("42"), vec![node("A", Some("n1")), node("Z", Some("n9"))]);
        let out = reconcile(&source, &existing);
        assert_eq!(out.workflow.nodes.len(), 1);
    }

    #[test]
    fn credential_id_copied_only_on_same_slot_and_name() {
        let source = workflow(
            None,
            vec![
                with_credential(node("A", None), "slackApi", "Billing Slack", None),
                with_credential(node("B", None), "slackApi", "Other Slack", None),
                with_credential(node("C", None), "httpBasicAuth", "Billing Slack", None),
            ],
        );
        let existing = workflow(
            Some("42"),
            vec![
                with_credential(node("A", Some("n1")), "slackApi", "Billing Slack", Some("c1")),
                with_credential(node("B", Some("n2")), "slackApi", "Billing Slack", Some("c1")),
                with_credential(node("C", Some("n3")), "slackApi", "Billing Slack", Some("c1")),
            ],
        );

        let out = reconcile(&source, &existing);
        let id_of = |i: usize| {
            out.workflow.nodes[i]
                .credentials
                .as_ref()
                .and_then(|c| c.values().next())
                .and_then(|c| c.id.clone())
        };
        assert_eq!(id_of(0).as_deref(), Some("c1"));
        assert_eq!(id_of(1), None);
        assert_eq!(id_of(2), None);

        let unresolved: Vec<_> = out
            .unresolved_credentials
            .iter()
            .map(|u| (u.node.as_str(), u.slot.as_str(), u.name.as_str()))
            .collect();
        assert_eq!(
            unresolved,
            vec![
                ("B", "slackApi", "Other Slack"),
                ("C", "httpBasicAuth", "Billing Slack")
            ]
        );
    }

    #[test]
    fn credentials_on_new_nodes_are_unresolved() {
        let source = workflow(
            None,
            vec![with_credential(node("New", None), "slackApi", "Billing Slack", None)],
        );
        let out = reconcile(&source, &workflow(Some("42"), vec![]));
        assert_eq!(out.unresolved_credentials.len(), 1);
        assert_eq!(unresolved_on_create(&source), out.unresolved_credentials);
    }
}
