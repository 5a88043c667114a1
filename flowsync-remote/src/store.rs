//! The remote workflow store contract.

use flowsync_core::types::{Tag, TagId, Workflow, WorkflowId, WorkflowPayload, WorkflowSummary};

use crate::error::RemoteError;

/// Operations the sync engine needs from a remote workflow service.
///
/// Implementations are blocking and shareable across threads; parallel
/// deploys call into one store from several worker threads at once.
pub trait WorkflowStore: Send + Sync {
    /// Every workflow in the environment, across all pages.
    fn list(&self) -> Result<Vec<WorkflowSummary>, RemoteError>;

    /// Full record. A missing workflow is [`RemoteError::NotFound`].
    fn get(&self, id: &WorkflowId) -> Result<Workflow, RemoteError>;

    /// Create a workflow. The service assigns the id and starts it inactive.
    fn create(&self, payload: &WorkflowPayload) -> Result<Workflow, RemoteError>;

    /// Replace a workflow's definition. A missing workflow is
    /// [`RemoteError::NotFound`].
    fn update(&self, id: &WorkflowId, payload: &WorkflowPayload) -> Result<Workflow, RemoteError>;

    /// Replace the workflow's tag assignment.
    fn set_tags(&self, id: &WorkflowId, tags: &[TagId]) -> Result<(), RemoteError>;

    fn list_tags(&self) -> Result<Vec<Tag>, RemoteError>;

    fn create_tag(&self, name: &str) -> Result<Tag, RemoteError>;

    fn activate(&self, id: &WorkflowId) -> Result<(), RemoteError>;

    fn deactivate(&self, id: &WorkflowId) -> Result<(), RemoteError>;
}
