//! flowsync core library: workflow types, local storage, configuration, errors.
//!
//! - [`types`]: workflow records, tags, categories
//! - [`storage`]: category layout, atomic save, file discovery, validation
//! - [`config`]: `flowsync.yaml` and per-environment connection settings
//! - [`error`]: [`WorkspaceError`]

pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{ActivationPolicy, EnvOverrides, EnvironmentConfig, ProjectConfig};
pub use error::WorkspaceError;
pub use storage::{Layout, Target, ValidationReport, WriteResult};
pub use types::{
    determine_category, Category, CredentialRef, Node, Tag, TagId, TagRef, Workflow, WorkflowId,
    WorkflowPayload, WorkflowSummary,
};
