//! kiln - build-and-verify harness
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Fetches a pinned source archive, builds each artifact a recipe lists,
//! installs the results under a prefix and smoke-tests the installed
//! executable.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.kiln/            # or $KILN_HOME
//! ├── work/           # staging directories for extracted sources
//! └── logs/           # build and smoke logs
//!
//! <prefix>/
//! ├── bin/
//! ├── lib/
//! └── include/<subdir>/
//! ```

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "kiln - build and verify packages from source recipes")]
pub struct Cli {
    /// Stream build output instead of writing it to log files
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Parent directory for source staging (default: $KILN_HOME/work)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Directory for build and smoke logs (default: $KILN_HOME/logs)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch, build, install and smoke-test a recipe
    Run {
        /// Recipe file
        recipe: PathBuf,
        /// Install prefix
        #[arg(long, env = "KILN_PREFIX")]
        prefix: PathBuf,
        /// Skip the smoke test
        #[arg(long)]
        skip_smoke: bool,
        /// Keep the extracted source tree
        #[arg(long)]
        keep_source: bool,
        /// Print a JSON report on stdout
        #[arg(long)]
        json: bool,
    },
    /// Fetch and verify a recipe's source, keeping the extracted tree
    Fetch {
        /// Recipe file
        recipe: PathBuf,
        /// Directory to extract into
        #[arg(long)]
        dest: PathBuf,
    },
    /// Build a recipe against an extracted source tree
    Build {
        /// Recipe file
        recipe: PathBuf,
        /// Extracted source tree
        #[arg(long)]
        source: PathBuf,
        /// Install into this prefix after building
        #[arg(long, env = "KILN_PREFIX")]
        prefix: Option<PathBuf>,
    },
    /// Smoke-test an installed prefix
    Smoke {
        /// Recipe file
        recipe: PathBuf,
        /// Install prefix
        #[arg(long, env = "KILN_PREFIX")]
        prefix: PathBuf,
    },
    /// Parse and validate a recipe
    Check {
        /// Recipe file
        recipe: PathBuf,
    },
    /// Print SHA-256 of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Settings shared by every command, resolved from global flags.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub verbose: bool,
    pub quiet: bool,
    pub work_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl GlobalOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbose: cli.verbose,
            quiet: cli.quiet,
            work_dir: cli.work_dir.clone().unwrap_or_else(kiln_core::work_dir),
            log_dir: cli.log_dir.clone().unwrap_or_else(kiln_core::log_dir),
        }
    }

    /// Harness options for a run installing into `prefix`.
    pub fn harness(&self, prefix: PathBuf) -> kiln_core::HarnessOptions {
        kiln_core::HarnessOptions {
            prefix,
            work_dir: self.work_dir.clone(),
            log_dir: self.log_dir.clone(),
            verbose: self.verbose,
            keep_source: false,
            skip_smoke: false,
        }
    }
}
