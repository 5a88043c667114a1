//! Domain types for workflow definitions and remote records.
//!
//! One explicit optional-field record ([`Workflow`]) serves as both the
//! source-controlled definition and the record returned by the remote
//! service. Environment-specific and runtime fields are all `Option` so a
//! canonical (portable) workflow is simply one where they are `None`.
//!
//! Field names follow the remote wire format (`camelCase`).

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Environment-local workflow identifier. Never portable across environments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Environment-local tag identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagId(pub String);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A tag name that doubles as a storage subdirectory (`business`, `shared`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(pub String);

impl Category {
    /// Case-insensitive match against a tag name.
    pub fn matches(&self, tag_name: &str) -> bool {
        self.0.eq_ignore_ascii_case(tag_name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The categories used when the project file does not list any.
pub fn default_categories() -> Vec<Category> {
    ["business", "management", "shared"]
        .into_iter()
        .map(Category::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tags and credentials
// ---------------------------------------------------------------------------

/// A tag from the remote catalog. `name` is the cross-environment identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// A tag reference carried on a workflow. Only `name` survives normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TagId>,
    pub name: String,
}

impl TagRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl From<Tag> for TagRef {
    fn from(tag: Tag) -> Self {
        Self {
            id: Some(tag.id),
            name: tag.name,
        }
    }
}

/// A credential slot value on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A single node in a workflow graph. `name` is unique within its workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_version: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[Number; 2]>,
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BTreeMap<String, CredentialRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_in_flow: Option<bool>,
    /// Execution output. Runtime only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Validation issues reported by the editor. Runtime only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Value>,
    /// Editor hints. Runtime only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<Value>,
    /// Remaining node settings (`retryOnFail`, `onError`, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Node {
    /// Minimal node, mostly for tests and fixtures.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type: node_type.into(),
            type_version: None,
            position: None,
            parameters: Map::new(),
            credentials: None,
            webhook_id: None,
            disabled: None,
            notes: None,
            notes_in_flow: None,
            data: None,
            issues: None,
            hints: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// A workflow, either as stored locally or as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WorkflowId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    pub nodes: Vec<Node>,
    pub connections: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// An empty workflow with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            active: None,
            nodes: Vec::new(),
            connections: BTreeMap::new(),
            settings: None,
            static_data: None,
            tags: None,
            pin_data: None,
            version_id: None,
            meta: None,
            is_archived: None,
            trigger_count: None,
            shared: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Tag names in declaration order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags
            .iter()
            .flatten()
            .map(|tag| tag.name.as_str())
            .collect()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }

    /// Schema problems beyond what deserialization already enforces.
    ///
    /// An empty vector means the workflow is well-formed.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("workflow name must not be blank".to_string());
        }

        let mut seen = HashSet::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.name.trim().is_empty() {
                problems.push(format!("nodes[{index}]: name must not be blank"));
            } else if !seen.insert(node.name.as_str()) {
                problems.push(format!("duplicate node name \"{}\"", node.name));
            }
            if node.node_type.trim().is_empty() {
                problems.push(format!("nodes[{index}]: type must not be blank"));
            }
        }

        for tag in self.tags.iter().flatten() {
            if tag.name.trim().is_empty() {
                problems.push("tag name must not be blank".to_string());
            }
        }
        problems
    }

    /// The body submitted on create/update. Read-only fields never leave.
    pub fn to_payload(&self) -> WorkflowPayload {
        WorkflowPayload {
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            connections: self.connections.clone(),
            settings: self.settings.clone().unwrap_or_default(),
            static_data: self.static_data.clone(),
        }
    }
}

/// The writable subset of a workflow accepted by create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPayload {
    pub name: String,
    pub nodes: Vec<Node>,
    pub connections: BTreeMap<String, Value>,
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<Value>,
}

/// A remote catalog entry, as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowSummary {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Pick the first configured category that appears among `tag_names`.
///
/// Matching is case-insensitive. `None` means the workflow is outside every
/// category and is invisible to pull and diff.
pub fn determine_category<'a>(
    tag_names: &[&str],
    categories: &'a [Category],
) -> Option<&'a Category> {
    categories
        .iter()
        .find(|category| tag_names.iter().any(|tag| category.matches(tag)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn newtype_display() {
        assert_eq!(WorkflowId::from("42").to_string(), "42");
        assert_eq!(TagId::from("t1").to_string(), "t1");
        assert_eq!(Category::from("business").to_string(), "business");
    }

    #[test]
    fn node_keeps_unknown_settings() {
        let raw = json!({
            "name": "HTTP",
            "type": "n8n-nodes-base.httpRequest",
            "typeVersion": 4,
            "position": [250, 300],
            "parameters": {"url": "https://example.com"},
            "retryOnFail": true,
            "onError": "continueRegularOutput"
        });
        let node: Node = serde_json::from_value(raw.clone()).expect("node");
        assert_eq!(node.extra.get("retryOnFail"), Some(&json!(true)));
        assert_eq!(serde_json::to_value(&node).expect("serialize"), raw);
    }

    #[test]
    fn workflow_requires_nodes_and_connections() {
        let err = serde_json::from_value::<Workflow>(json!({"name": "x"})).unwrap_err();
        assert!(err.to_string().contains("nodes"), "got: {err}");
    }

    #[test]
    fn problems_flag_duplicate_and_blank_names() {
        let mut wf = Workflow::new(" ");
        wf.nodes.push(Node::new("A", "t"));
        wf.nodes.push(Node::new("A", "t"));
        wf.nodes.push(Node::new("B", ""));
        let problems = wf.problems();
        assert!(problems.iter().any(|p| p.contains("workflow name")));
        assert!(problems.iter().any(|p| p.contains("duplicate node name \"A\"")));
        assert!(problems.iter().any(|p| p.contains("nodes[2]: type")));
    }

    #[test]
    fn payload_defaults_settings_and_drops_read_only_fields() {
        let mut wf = Workflow::new("Invoice");
        wf.id = Some(WorkflowId::from("9"));
        wf.active = Some(true);
        wf.tags = Some(vec![TagRef::named("business")]);
        let payload = serde_json::to_value(wf.to_payload()).expect("payload");
        assert_eq!(
            payload,
            json!({"name": "Invoice", "nodes": [], "connections": {}, "settings": {}})
        );
    }

    #[test]
    fn category_match_is_case_insensitive_and_ordered() {
        let categories = default_categories();
        assert_eq!(
            determine_category(&["Shared", "BUSINESS"], &categories),
            Some(&Category::from("business"))
        );
        assert_eq!(determine_category(&["experimental"], &categories), None);
    }

    #[test]
    fn summary_tolerates_missing_optional_fields() {
        let summary: WorkflowSummary =
            serde_json::from_value(json!({"id": "1", "name": "Invoice", "nodes": []}))
                .expect("summary");
        assert!(!summary.active);
        assert!(summary.tags.is_empty());
    }
}
