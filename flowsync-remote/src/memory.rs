//! In-memory [`WorkflowStore`] for tests and offline runs.
//!
//! Behaves like the remote service for the subset of behaviour the sync
//! engine relies on: ids are assigned on create, created workflows start
//! inactive, tag assignment resolves ids against the catalog. Every call is
//! recorded, and faults can be injected per operation and per workflow or tag
//! name.

use std::sync::{Mutex, MutexGuard};

use flowsync_core::types::{
    Tag, TagId, TagRef, Workflow, WorkflowId, WorkflowPayload, WorkflowSummary,
};

use crate::error::RemoteError;
use crate::store::WorkflowStore;

/// Store operation, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Create,
    Update,
    SetTags,
    ListTags,
    CreateTag,
    Activate,
    Deactivate,
}

/// A recorded call with its salient argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Get(WorkflowId),
    Create(String),
    Update(WorkflowId),
    SetTags(WorkflowId, Vec<TagId>),
    ListTags,
    CreateTag(String),
    Activate(WorkflowId),
    Deactivate(WorkflowId),
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::List => Op::List,
            Call::Get(_) => Op::Get,
            Call::Create(_) => Op::Create,
            Call::Update(_) => Op::Update,
            Call::SetTags(..) => Op::SetTags,
            Call::ListTags => Op::ListTags,
            Call::CreateTag(_) => Op::CreateTag,
            Call::Activate(_) => Op::Activate,
            Call::Deactivate(_) => Op::Deactivate,
        }
    }
}

/// What an injected fault makes the operation return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Status(u16),
    NotFound,
    Transport,
}

#[derive(Debug)]
struct Injected {
    op: Op,
    /// Workflow name (or tag name for tag operations); `None` matches any.
    subject: Option<String>,
    fault: Fault,
}

#[derive(Debug, Default)]
struct State {
    workflows: Vec<Workflow>,
    tags: Vec<Tag>,
    next_workflow: u64,
    next_node: u64,
    next_tag: u64,
    calls: Vec<Call>,
    faults: Vec<Injected>,
}

impl State {
    fn position(&self, id: &WorkflowId) -> Option<usize> {
        self.workflows
            .iter()
            .position(|wf| wf.id.as_ref() == Some(id))
    }

    fn name_of(&self, id: &WorkflowId) -> Option<String> {
        self.position(id).map(|i| self.workflows[i].name.clone())
    }

    fn check(&self, op: Op, subject: Option<&str>, resource: &str) -> Result<(), RemoteError> {
        let hit = self.faults.iter().find(|f| {
            f.op == op
                && match (&f.subject, subject) {
                    (None, _) => true,
                    (Some(wanted), Some(actual)) => wanted == actual,
                    (Some(_), None) => false,
                }
        });
        match hit.map(|f| f.fault) {
            None => Ok(()),
            Some(Fault::NotFound) => Err(RemoteError::NotFound {
                resource: resource.to_string(),
            }),
            Some(Fault::Status(status)) => Err(RemoteError::Api {
                status,
                body: format!("{{\"message\":\"injected {status}\"}}"),
            }),
            Some(Fault::Transport) => Err(RemoteError::Transport {
                url: "memory://".to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }

    fn assign_node_ids(&mut self, workflow: &mut Workflow) {
        for node in &mut workflow.nodes {
            if node.id.is_none() {
                self.next_node += 1;
                node.id = Some(format!("node-{}", self.next_node));
            }
        }
    }

    fn tag_named(&mut self, name: &str) -> Tag {
        if let Some(tag) = self.tags.iter().find(|t| t.name == name) {
            return tag.clone();
        }
        self.next_tag += 1;
        let tag = Tag {
            id: TagId(format!("tag-{}", self.next_tag)),
            name: name.to_string(),
        };
        self.tags.push(tag.clone());
        tag
    }

    fn not_found(id: &WorkflowId) -> RemoteError {
        RemoteError::NotFound {
            resource: format!("workflow {id}"),
        }
    }
}

/// Thread-safe in-memory workflow service.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a workflow as if it already existed remotely.
    ///
    /// Missing workflow and node ids are assigned; tag references are
    /// registered in the catalog by name.
    pub fn insert_workflow(&self, mut workflow: Workflow) -> WorkflowId {
        let mut state = self.state();
        let id = match workflow.id.clone() {
            Some(id) => id,
            None => {
                state.next_workflow += 1;
                WorkflowId(format!("wf-{}", state.next_workflow))
            }
        };
        workflow.id = Some(id.clone());
        state.assign_node_ids(&mut workflow);
        if let Some(tags) = workflow.tags.take() {
            let resolved = tags
                .iter()
                .map(|tag| TagRef::from(state.tag_named(&tag.name)))
                .collect();
            workflow.tags = Some(resolved);
        }
        state.workflows.push(workflow);
        id
    }

    /// Seed a tag into the catalog, returning the existing one if the name is known.
    pub fn insert_tag(&self, name: &str) -> Tag {
        self.state().tag_named(name)
    }

    /// Delete a workflow without recording a call.
    pub fn remove_workflow(&self, id: &WorkflowId) -> Option<Workflow> {
        let mut state = self.state();
        let index = state.position(id)?;
        Some(state.workflows.remove(index))
    }

    /// Make `op` fail whenever it touches `subject` (any subject when `None`).
    pub fn inject(&self, op: Op, subject: Option<&str>, fault: Fault) {
        self.state().faults.push(Injected {
            op,
            subject: subject.map(str::to_owned),
            fault,
        });
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.state().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn workflows(&self) -> Vec<Workflow> {
        self.state().workflows.clone()
    }

    pub fn workflow_named(&self, name: &str) -> Option<Workflow> {
        self.state()
            .workflows
            .iter()
            .find(|wf| wf.name == name)
            .cloned()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state().tags.clone()
    }
}

impl WorkflowStore for MemoryStore {
    fn list(&self) -> Result<Vec<WorkflowSummary>, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::List);
        state.check(Op::List, None, "workflows")?;
        Ok(state
            .workflows
            .iter()
            .filter_map(|wf| {
                let id = wf.id.clone()?;
                let tags = wf
                    .tags
                    .iter()
                    .flatten()
                    .filter_map(|tag| {
                        tag.id.clone().map(|id| Tag {
                            id,
                            name: tag.name.clone(),
                        })
                    })
                    .collect();
                Some(WorkflowSummary {
                    id,
                    name: wf.name.clone(),
                    active: wf.is_active(),
                    tags,
                    updated_at: wf.updated_at,
                })
            })
            .collect())
    }

    fn get(&self, id: &WorkflowId) -> Result<Workflow, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Get(id.clone()));
        let name = state.name_of(id);
        state.check(Op::Get, name.as_deref(), &format!("workflow {id}"))?;
        let index = state.position(id).ok_or_else(|| State::not_found(id))?;
        Ok(state.workflows[index].clone())
    }

    fn create(&self, payload: &WorkflowPayload) -> Result<Workflow, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Create(payload.name.clone()));
        state.check(Op::Create, Some(&payload.name), "workflows")?;

        state.next_workflow += 1;
        let mut workflow = Workflow::new(payload.name.clone());
        workflow.id = Some(WorkflowId(format!("wf-{}", state.next_workflow)));
        workflow.active = Some(false);
        workflow.nodes = payload.nodes.clone();
        workflow.connections = payload.connections.clone();
        workflow.settings = Some(payload.settings.clone());
        workflow.static_data = payload.static_data.clone();
        state.assign_node_ids(&mut workflow);
        state.workflows.push(workflow.clone());
        Ok(workflow)
    }

    fn update(&self, id: &WorkflowId, payload: &WorkflowPayload) -> Result<Workflow, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Update(id.clone()));
        let name = state.name_of(id);
        state.check(Op::Update, name.as_deref(), &format!("workflow {id}"))?;
        let index = state.position(id).ok_or_else(|| State::not_found(id))?;

        let mut workflow = state.workflows[index].clone();
        workflow.name = payload.name.clone();
        workflow.nodes = payload.nodes.clone();
        workflow.connections = payload.connections.clone();
        workflow.settings = Some(payload.settings.clone());
        workflow.static_data = payload.static_data.clone();
        state.assign_node_ids(&mut workflow);
        state.workflows[index] = workflow.clone();
        Ok(workflow)
    }

    fn set_tags(&self, id: &WorkflowId, tags: &[TagId]) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::SetTags(id.clone(), tags.to_vec()));
        let name = state.name_of(id);
        state.check(Op::SetTags, name.as_deref(), &format!("workflow {id}"))?;
        let index = state.position(id).ok_or_else(|| State::not_found(id))?;

        let mut refs = Vec::with_capacity(tags.len());
        for tag_id in tags {
            let tag = state
                .tags
                .iter()
                .find(|t| &t.id == tag_id)
                .cloned()
                .ok_or_else(|| RemoteError::Api {
                    status: 400,
                    body: format!("{{\"message\":\"unknown tag {tag_id}\"}}"),
                })?;
            refs.push(TagRef::from(tag));
        }
        state.workflows[index].tags = Some(refs);
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<Tag>, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::ListTags);
        state.check(Op::ListTags, None, "tags")?;
        Ok(state.tags.clone())
    }

    fn create_tag(&self, name: &str) -> Result<Tag, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::CreateTag(name.to_string()));
        state.check(Op::CreateTag, Some(name), "tags")?;
        if state.tags.iter().any(|t| t.name == name) {
            return Err(RemoteError::Api {
                status: 409,
                body: format!("{{\"message\":\"tag '{name}' already exists\"}}"),
            });
        }
        Ok(state.tag_named(name))
    }

    fn activate(&self, id: &WorkflowId) -> Result<(), RemoteError> {
        self.set_active(id, true)
    }

    fn deactivate(&self, id: &WorkflowId) -> Result<(), RemoteError> {
        self.set_active(id, false)
    }
}

impl MemoryStore {
    fn set_active(&self, id: &WorkflowId, active: bool) -> Result<(), RemoteError> {
        let (call, op) = if active {
            (Call::Activate(id.clone()), Op::Activate)
        } else {
            (Call::Deactivate(id.clone()), Op::Deactivate)
        };
        let mut state = self.state();
        state.calls.push(call);
        let name = state.name_of(id);
        state.check(op, name.as_deref(), &format!("workflow {id}"))?;
        let index = state.position(id).ok_or_else(|| State::not_found(id))?;
        state.workflows[index].active = Some(active);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flowsync_core::types::Node;

    fn payload(name: &str) -> WorkflowPayload {
        let mut wf = Workflow::new(name);
        wf.nodes.push(Node::new("Start", "n8n-nodes-base.manualTrigger"));
        wf.to_payload()
    }

    #[test]
    fn create_assigns_ids_and_starts_inactive() {
        let store = MemoryStore::new();
        let created = store.create(&payload("Invoice")).expect("create");
        assert_eq!(created.id, Some(WorkflowId::from("wf-1")));
        assert_eq!(created.active, Some(false));
        assert!(created.nodes[0].id.is_some());
        assert_eq!(store.calls(), vec![Call::Create("Invoice".to_string())]);
    }

    #[test]
    fn update_keeps_existing_node_ids() {
        let store = MemoryStore::new();
        let created = store.create(&payload("Invoice")).expect("create");
        let id = created.id.clone().expect("id");
        let mut next = created.clone();
        next.nodes.push(Node::new("Set", "n8n-nodes-base.set"));
        let updated = store.update(&id, &next.to_payload()).expect("update");
        assert_eq!(updated.nodes[0].id, created.nodes[0].id);
        assert!(updated.nodes[1].id.is_some());
    }

    #[test]
    fn set_tags_shows_up_in_list() {
        let store = MemoryStore::new();
        let id = store.insert_workflow(Workflow::new("Invoice"));
        let tag = store.insert_tag("business");
        store.set_tags(&id, &[tag.id.clone()]).expect("tags");
        let listed = store.list().expect("list");
        assert_eq!(listed[0].tag_names(), vec!["business"]);
    }

    #[test]
    fn set_tags_rejects_unknown_id() {
        let store = MemoryStore::new();
        let id = store.insert_workflow(Workflow::new("Invoice"));
        let err = store.set_tags(&id, &[TagId::from("nope")]).unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 400, .. }));
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get(&WorkflowId::from("wf-9")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn injected_fault_targets_one_workflow() {
        let store = MemoryStore::new();
        let a = store.insert_workflow(Workflow::new("A"));
        let b = store.insert_workflow(Workflow::new("B"));
        store.inject(Op::Get, Some("B"), Fault::Status(500));
        assert!(store.get(&a).is_ok());
        assert!(matches!(
            store.get(&b).unwrap_err(),
            RemoteError::Api { status: 500, .. }
        ));
        store.clear_faults();
        assert!(store.get(&b).is_ok());
    }

    #[test]
    fn activate_flips_flag() {
        let store = MemoryStore::new();
        let id = store.insert_workflow(Workflow::new("A"));
        store.activate(&id).expect("activate");
        assert_eq!(store.workflow_named("A").and_then(|w| w.active), Some(true));
        assert_eq!(store.count(Op::Activate), 1);
    }

    #[test]
    fn duplicate_tag_create_is_conflict() {
        let store = MemoryStore::new();
        store.insert_tag("prod");
        let err = store.create_tag("prod").unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 409, .. }));
    }
}
