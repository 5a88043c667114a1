//! Error types for flowsync-sync.

use thiserror::Error;

use flowsync_core::WorkspaceError;
use flowsync_remote::RemoteError;

/// Errors that stop a whole sync command.
///
/// Per-workflow problems never surface here; they are recorded in the
/// command's report and the run carries on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local storage or configuration failure.
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// A remote call that the whole command depends on (catalog listing).
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The worker runtime for parallel deploys could not start.
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
