//! # flowsync-sync
//!
//! The reconciliation and diff engine.
//!
//! - [`normalize`]: canonical, environment-portable workflow form
//! - [`reconcile`]: carry remote ids onto a source definition by name
//! - [`tags`]: tag name → environment id resolution
//! - [`diff`]: structural comparison and workspace diff
//! - [`deploy`]: per-file create-or-update state machine and batches
//! - [`pull`]: download categorized workflows into local storage

pub mod deploy;
pub mod diff;
pub mod error;
pub mod normalize;
pub mod pull;
pub mod reconcile;
pub mod tags;

pub use deploy::{deploy_batch, deploy_file, BatchMode, BatchReport, DeployOptions, DeployReport, Outcome};
pub use diff::{diff, diff_workspace, DiffReport, DiffResult, DiffStatus};
pub use error::SyncError;
pub use normalize::{normalize, Canonical};
pub use pull::{pull, PullReport};
pub use reconcile::{reconcile, Reconciled, UnresolvedCredential};
pub use tags::{resolve_tags, TagResolution};
