//! Flowsync: keep n8n workflow definitions in version control.
//!
//! # Usage
//!
//! ```text
//! flowsync [--root <dir>] [-v|-vv] <command>
//!
//! flowsync pull <env> [--category <name>]
//! flowsync deploy <env> [<category>|<file.json>] [--dry-run] [--parallel] [--activation <policy>] [--json]
//! flowsync diff <env> [<category>|<file.json>] [--json]
//! flowsync list [--remote <env>] [--json]
//! flowsync validate
//! ```

mod commands;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    deploy::DeployArgs, diff::DiffArgs, list::ListArgs, pull::PullArgs, validate::ValidateArgs,
};
use flowsync_core::ActivationPolicy;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "flowsync",
    version,
    about = "Sync n8n workflow definitions between local JSON files and n8n environments",
    long_about = None,
)]
struct Cli {
    /// Project root holding flowsync.yaml, config/ and the workflows directory.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download categorized workflows from an environment into local files.
    Pull(PullArgs),

    /// Create or update workflows in an environment from local files.
    Deploy(DeployArgs),

    /// Compare local files with an environment.
    Diff(DiffArgs),

    /// List local workflows, and optionally an environment's catalog.
    List(ListArgs),

    /// Check every local workflow file for JSON and schema errors.
    Validate(ValidateArgs),
}

// ---------------------------------------------------------------------------
// Shared ActivationPolicy argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `ActivationPolicy` from CLI args.
#[derive(Debug, Clone, Copy)]
pub struct ActivationArg(pub ActivationPolicy);

impl FromStr for ActivationArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self(ActivationPolicy::Preserve)),
            "new-only" => Ok(Self(ActivationPolicy::NewOnly)),
            "never" => Ok(Self(ActivationPolicy::Never)),
            other => Err(format!(
                "unknown activation policy '{other}'; expected: preserve, new-only, never"
            )),
        }
    }
}

impl fmt::Display for ActivationArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = cli.root;
    match cli.command {
        Commands::Pull(args) => args.run(&root),
        Commands::Deploy(args) => args.run(&root),
        Commands::Diff(args) => args.run(&root),
        Commands::List(args) => args.run(&root),
        Commands::Validate(args) => args.run(&root),
    }
}
