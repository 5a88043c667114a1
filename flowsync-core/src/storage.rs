//! Local workflow storage.
//!
//! # Storage layout
//!
//! ```text
//! <root>/workflows/
//!   <category>/
//!     <sanitized-name>.json   (canonical workflow, pretty JSON + trailing newline)
//! ```
//!
//! Only configured categories are scanned. Writes go through a `.tmp`
//! sibling and a rename so a crash never leaves a half-written workflow.

use std::path::{Path, PathBuf};

use crate::error::{io_err, WorkspaceError};
use crate::types::{Category, Workflow};

// ---------------------------------------------------------------------------
// 1. Layout
// ---------------------------------------------------------------------------

/// Where workflows live and which subdirectories count as categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub workflows_root: PathBuf,
    pub categories: Vec<Category>,
}

impl Layout {
    pub fn new(workflows_root: impl Into<PathBuf>, categories: Vec<Category>) -> Self {
        Self {
            workflows_root: workflows_root.into(),
            categories,
        }
    }

    /// `<workflows_root>/<category>/`
    pub fn category_dir(&self, category: &Category) -> PathBuf {
        self.workflows_root.join(&category.0)
    }

    /// `<workflows_root>/<category>/<sanitized-name>.json`. Pure, no I/O.
    pub fn workflow_path(&self, category: &Category, workflow_name: &str) -> PathBuf {
        self.category_dir(category)
            .join(format!("{}.json", sanitize_file_stem(workflow_name)))
    }

    /// The configured category matching `name`, case-insensitively.
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.matches(name))
    }

    /// All `*.json` files in configured category directories.
    ///
    /// Ordered by configured category, then file name. A missing category
    /// directory contributes nothing.
    pub fn find_workflow_files(
        &self,
        only: Option<&Category>,
    ) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut files = Vec::new();
        for category in &self.categories {
            if only.is_some_and(|wanted| wanted != category) {
                continue;
            }
            let dir = self.category_dir(category);
            if !dir.is_dir() {
                continue;
            }
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
                .map_err(|e| io_err(&dir, e))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();
            files.extend(entries);
        }
        Ok(files)
    }

    /// Files selected by a deploy/diff target.
    pub fn files_for(&self, target: &Target) -> Result<Vec<PathBuf>, WorkspaceError> {
        match target {
            Target::All => self.find_workflow_files(None),
            Target::Category(category) => self.find_workflow_files(Some(category)),
            Target::File(path) => Ok(vec![path.clone()]),
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 2. Targets
// ---------------------------------------------------------------------------

/// What a deploy or diff run should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Category(Category),
    File(PathBuf),
}

/// Interpret a command-line target.
///
/// `None` selects everything; a `.json` suffix selects one file (relative to
/// `root` unless absolute); anything else must name a configured category.
pub fn resolve_target(
    root: &Path,
    layout: &Layout,
    arg: Option<&str>,
) -> Result<Target, WorkspaceError> {
    let Some(arg) = arg else {
        return Ok(Target::All);
    };
    if arg.ends_with(".json") {
        let path = Path::new(arg);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        return Ok(Target::File(path));
    }
    layout
        .category(arg)
        .cloned()
        .map(Target::Category)
        .ok_or_else(|| WorkspaceError::UnknownCategory {
            name: arg.to_string(),
            expected: layout
                .categories
                .iter()
                .map(|c| c.0.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load and schema-check a workflow file.
///
/// Returns `WorkspaceError::Parse` for malformed JSON or a wrong record
/// shape, `WorkspaceError::Invalid` for schema problems such as duplicate
/// node names.
pub fn load_workflow(path: &Path) -> Result<Workflow, WorkspaceError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let workflow: Workflow = serde_json::from_str(&contents).map_err(|source| {
        WorkspaceError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let problems = workflow.problems();
    if !problems.is_empty() {
        return Err(WorkspaceError::Invalid {
            path: path.to_path_buf(),
            problems,
        });
    }
    Ok(workflow)
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Outcome of writing one workflow file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File already held exactly these bytes.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path } | WriteResult::Unchanged { path } => path,
        }
    }
}

/// Serialized file form: pretty JSON with a trailing newline.
pub fn render_workflow(workflow: &Workflow) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(workflow)?;
    json.push('\n');
    Ok(json)
}

/// Write `workflow` as-is to its slot under `category`.
///
/// Callers pass the canonical form; this function does no normalization.
/// Write flow: render → compare with disk → `.json.tmp` sibling → `rename`.
pub fn save_workflow(
    layout: &Layout,
    category: &Category,
    workflow: &Workflow,
) -> Result<WriteResult, WorkspaceError> {
    let path = layout.workflow_path(category, &workflow.name);
    let rendered = render_workflow(workflow)?;

    match std::fs::read_to_string(&path) {
        Ok(existing) if existing == rendered => {
            return Ok(WriteResult::Unchanged { path });
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(&path, err)),
    }

    let dir = layout.category_dir(category);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &rendered).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(WriteResult::Written { path })
}

// ---------------------------------------------------------------------------
// 5. Validate
// ---------------------------------------------------------------------------

/// Result of checking every stored workflow file.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: Vec<PathBuf>,
    pub invalid: Vec<(PathBuf, String)>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Load every workflow file through the schema boundary.
pub fn validate_all(layout: &Layout) -> Result<ValidationReport, WorkspaceError> {
    let mut report = ValidationReport::default();
    for path in layout.find_workflow_files(None)? {
        match load_workflow(&path) {
            Ok(_) => report.valid.push(path),
            Err(err) => report.invalid.push((path, err.to_string())),
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
