//! Subcommands and the project/environment plumbing they share.

pub mod deploy;
pub mod diff;
pub mod list;
pub mod pull;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use flowsync_core::config::{
    environment_path_at, load_environment_at, load_project_at, API_KEY_VAR, API_URL_VAR,
};
use flowsync_core::{EnvOverrides, EnvironmentConfig, Layout, ProjectConfig};
use flowsync_remote::{HttpStore, WorkflowStore};

/// A loaded project: its root, `flowsync.yaml` settings and storage layout.
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub layout: Layout,
}

impl Project {
    pub fn open(root: &Path) -> Result<Self> {
        let config = load_project_at(root)
            .with_context(|| format!("failed to load project at {}", root.display()))?;
        let layout = config.layout(root);
        Ok(Self {
            root: root.to_path_buf(),
            config,
            layout,
        })
    }

    /// `path` relative to the project root when it lies inside it.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    pub fn environment(&self, name: &str) -> Result<EnvironmentConfig> {
        load_environment_at(&self.root, name, &EnvOverrides::from_process())
            .with_context(|| format!("failed to load environment '{name}'"))
    }

    /// Build an HTTP client for the named environment. Makes no requests.
    pub fn connect(&self, name: &str) -> Result<HttpStore> {
        let env = self.environment(name)?;
        tracing::debug!("environment '{}' -> {}", env.name, env.api_url);
        HttpStore::new(&env.api_url, &env.api_key)
            .with_context(|| format!("environment '{name}' has an unusable api_url"))
    }

    /// Build a client and prove it works by listing workflows once.
    pub fn connect_checked(&self, name: &str) -> Result<HttpStore> {
        let store = self.connect(name)?;
        store.list().with_context(|| {
            format!(
                "cannot reach environment '{name}' at {}; check api_url and api_key in {} \
                 or set {API_URL_VAR} / {API_KEY_VAR}",
                store.base_url(),
                self.display_path(&environment_path_at(&self.root, name)),
            )
        })?;
        Ok(store)
    }
}
