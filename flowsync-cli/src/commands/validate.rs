//! `flowsync validate`: check local workflow files without touching a remote.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use flowsync_core::storage::validate_all;

use super::Project;

/// Arguments for `flowsync validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Only report problems.
    #[arg(long, short)]
    pub quiet: bool,
}

impl ValidateArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let project = Project::open(root)?;
        let report = validate_all(&project.layout).context("failed to scan workflow files")?;

        let total = report.valid.len() + report.invalid.len();
        if total == 0 {
            println!(
                "No workflow files found under {}",
                project.display_path(&project.layout.workflows_root)
            );
            return Ok(());
        }

        if !self.quiet {
            for path in &report.valid {
                println!("  ✓  {}", project.display_path(path));
            }
        }
        for (path, message) in &report.invalid {
            println!("  {}  {}", "✗".red(), project.display_path(path).bold());
            println!("     {message}");
        }

        if !report.is_clean() {
            bail!("{} of {total} workflow file(s) are invalid", report.invalid.len());
        }
        println!("{}", format!("✓ {total} workflow file(s) valid").green());
        Ok(())
    }
}
