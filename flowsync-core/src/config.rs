//! Project and environment configuration.
//!
//! # Files
//!
//! ```text
//! <root>/
//!   flowsync.yaml           (optional project settings)
//!   config/
//!     <environment>.yaml    (api_url + api_key per environment)
//! ```
//!
//! Every value here is loaded once and passed explicitly to the code that
//! needs it. Process environment variables are read only by
//! [`EnvOverrides::from_process`], so loaders stay pure for tests.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, WorkspaceError};
use crate::storage::Layout;
use crate::types::{default_categories, Category};

pub const PROJECT_FILE: &str = "flowsync.yaml";
pub const CONFIG_DIR: &str = "config";
pub const API_URL_VAR: &str = "N8N_API_URL";
pub const API_KEY_VAR: &str = "N8N_API_KEY";

// ---------------------------------------------------------------------------
// Project config
// ---------------------------------------------------------------------------

/// Whether a freshly created workflow is activated when its source says
/// `active: true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationPolicy {
    /// Activate both brand-new and recreated workflows.
    #[default]
    Preserve,
    /// Activate brand-new workflows only; recreated ones stay inactive.
    NewOnly,
    /// Never activate; an operator turns workflows on by hand.
    Never,
}

impl ActivationPolicy {
    /// `recreated` is true when the workflow existed remotely under this
    /// name but vanished between lookup and write.
    pub fn should_activate(self, source_active: bool, recreated: bool) -> bool {
        if !source_active {
            return false;
        }
        match self {
            ActivationPolicy::Preserve => true,
            ActivationPolicy::NewOnly => !recreated,
            ActivationPolicy::Never => false,
        }
    }
}

impl fmt::Display for ActivationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationPolicy::Preserve => write!(f, "preserve"),
            ActivationPolicy::NewOnly => write!(f, "new-only"),
            ActivationPolicy::Never => write!(f, "never"),
        }
    }
}

/// Contents of `flowsync.yaml`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub workflows_dir: PathBuf,
    pub categories: Vec<Category>,
    pub activation: ActivationPolicy,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            workflows_dir: PathBuf::from("workflows"),
            categories: default_categories(),
            activation: ActivationPolicy::default(),
        }
    }
}

impl ProjectConfig {
    /// Storage layout rooted at `root`.
    pub fn layout(&self, root: &Path) -> Layout {
        Layout::new(root.join(&self.workflows_dir), self.categories.clone())
    }
}

/// Load `<root>/flowsync.yaml`, falling back to defaults when absent.
pub fn load_project_at(root: &Path) -> Result<ProjectConfig, WorkspaceError> {
    let path = root.join(PROJECT_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let config = serde_yaml::from_str::<Option<ProjectConfig>>(&contents)
        .map_err(|source| WorkspaceError::ConfigParse { path: path.clone(), source })?
        .unwrap_or_default();

    let origin = path.display().to_string();
    if config.categories.is_empty() {
        return Err(WorkspaceError::InvalidConfig {
            origin,
            field: "categories",
            message: "at least one category is required".to_string(),
        });
    }
    if let Some(bad) = config
        .categories
        .iter()
        .find(|c| c.0.is_empty() || c.0.contains(&['/', '\\'][..]) || c.0 == "." || c.0 == "..")
    {
        return Err(WorkspaceError::InvalidConfig {
            origin,
            field: "categories",
            message: format!("'{bad}' is not a usable directory name"),
        });
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment config
// ---------------------------------------------------------------------------

/// Connection settings for one remote environment.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub name: String,
    pub api_url: String,
    pub api_key: String,
}

impl fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Values taken from the process environment, applied over file values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

impl EnvOverrides {
    /// Read `N8N_API_URL` / `N8N_API_KEY`. Empty values count as unset.
    pub fn from_process() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_url: read(API_URL_VAR),
            api_key: read(API_KEY_VAR),
        }
    }

    fn is_complete(&self) -> bool {
        self.api_url.is_some() && self.api_key.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
struct EnvironmentFile {
    api_url: Option<String>,
    api_key: Option<String>,
}

/// `<root>/config/<name>.yaml`. Pure, no I/O.
pub fn environment_path_at(root: &Path, name: &str) -> PathBuf {
    root.join(CONFIG_DIR).join(format!("{name}.yaml"))
}

/// Names of all `config/*.yaml` files, sorted. `template.yaml` is skipped.
pub fn list_environments_at(root: &Path) -> Vec<String> {
    let dir = root.join(CONFIG_DIR);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.strip_suffix(".yaml").map(str::to_owned)
        })
        .filter(|name| name != "template")
        .collect();
    names.sort();
    names
}

/// Load the named environment, applying `overrides` on top of the file.
///
/// A missing file is only an error when the overrides do not supply both
/// values on their own.
pub fn load_environment_at(
    root: &Path,
    name: &str,
    overrides: &EnvOverrides,
) -> Result<EnvironmentConfig, WorkspaceError> {
    if name.is_empty() || name.contains(&['/', '\\'][..]) {
        return Err(WorkspaceError::InvalidConfig {
            origin: "command line".to_string(),
            field: "environment",
            message: format!("'{name}' is not a valid environment name"),
        });
    }

    let path = environment_path_at(root, name);
    let file = if path.exists() {
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_yaml::from_str::<Option<EnvironmentFile>>(&contents)
            .map_err(|source| WorkspaceError::ConfigParse { path: path.clone(), source })?
            .unwrap_or_default()
    } else if overrides.is_complete() {
        EnvironmentFile::default()
    } else {
        let available = list_environments_at(root);
        return Err(WorkspaceError::EnvironmentNotFound {
            path,
            available: if available.is_empty() {
                "none configured".to_string()
            } else {
                available.join(", ")
            },
        });
    };

    let origin = path.display().to_string();
    let api_url = overrides
        .api_url
        .clone()
        .or(file.api_url)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WorkspaceError::InvalidConfig {
            origin: origin.clone(),
            field: "api_url",
            message: format!("required (or set {API_URL_VAR})"),
        })?;
    let api_key = overrides
        .api_key
        .clone()
        .or(file.api_key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WorkspaceError::InvalidConfig {
            origin,
            field: "api_key",
            message: format!("required (or set {API_KEY_VAR})"),
        })?;

    Ok(EnvironmentConfig {
        name: name.to_string(),
        api_url,
        api_key,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn project_defaults_when_file_missing() {
        let root = TempDir::new().unwrap();
        let config = load_project_at(root.path()).expect("load");
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.categories.len(), 3);
    }

    #[test]
    fn project_partial_file_keeps_other_defaults() {
        let root = TempDir::new().unwrap();
        write(root.path(), PROJECT_FILE, "activation: never\n");
        let config = load_project_at(root.path()).expect("load");
        assert_eq!(config.activation, ActivationPolicy::Never);
        assert_eq!(config.workflows_dir, PathBuf::from("workflows"));
    }

    #[test]
    fn project_rejects_empty_categories() {
        let root = TempDir::new().unwrap();
        write(root.path(), PROJECT_FILE, "categories: []\n");
        let err = load_project_at(root.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidConfig { field: "categories", .. }));
    }

    #[test]
    fn environment_file_values_are_used() {
        let root = TempDir::new().unwrap();
        write(
            root.path(),
            "config/test.yaml",
            "api_url: https://acme.app.n8n.cloud/api/v1\napi_key: secret\n",
        );
        let env = load_environment_at(root.path(), "test", &EnvOverrides::default()).expect("load");
        assert_eq!(env.api_url, "https://acme.app.n8n.cloud/api/v1");
        assert_eq!(env.api_key, "secret");
        assert!(!format!("{env:?}").contains("secret"));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let root = TempDir::new().unwrap();
        write(root.path(), "config/test.yaml", "api_url: https://a/api/v1\napi_key: k\n");
        let overrides = EnvOverrides {
            api_url: Some("https://b/api/v1".to_string()),
            api_key: None,
        };
        let env = load_environment_at(root.path(), "test", &overrides).expect("load");
        assert_eq!(env.api_url, "https://b/api/v1");
        assert_eq!(env.api_key, "k");
    }

    #[test]
    fn complete_overrides_stand_in_for_missing_file() {
        let root = TempDir::new().unwrap();
        let overrides = EnvOverrides {
            api_url: Some("https://b/api/v1".to_string()),
            api_key: Some("k".to_string()),
        };
        let env = load_environment_at(root.path(), "ci", &overrides).expect("load");
        assert_eq!(env.name, "ci");
    }

    #[test]
    fn missing_environment_lists_available_ones() {
        let root = TempDir::new().unwrap();
        write(root.path(), "config/production.yaml", "api_url: x\napi_key: y\n");
        write(root.path(), "config/template.yaml", "");
        let err = load_environment_at(root.path(), "staging", &EnvOverrides::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("staging.yaml"), "got: {msg}");
        assert!(msg.contains("production"), "got: {msg}");
        assert!(!msg.contains("template"), "got: {msg}");
    }

    #[test]
    fn missing_key_names_the_field() {
        let root = TempDir::new().unwrap();
        write(root.path(), "config/test.yaml", "api_url: https://a/api/v1\n");
        let err = load_environment_at(root.path(), "test", &EnvOverrides::default()).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidConfig { field: "api_key", .. }));
    }

    #[test]
    fn activation_policy_matrix() {
        assert!(ActivationPolicy::Preserve.should_activate(true, true));
        assert!(ActivationPolicy::NewOnly.should_activate(true, false));
        assert!(!ActivationPolicy::NewOnly.should_activate(true, true));
        assert!(!ActivationPolicy::Never.should_activate(true, false));
        assert!(!ActivationPolicy::Preserve.should_activate(false, false));
    }
}
