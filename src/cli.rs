// src/cli.rs
//! CLI definitions for kiln
//!
//! Every command composes the derivation from the same inputs:
//! the manifest, the host (or `--platform`) and the enabled features.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author = "Kiln Contributors")]
#[command(version)]
#[command(about = "Declarative build composition for native GUI applications", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every command
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Path to the project manifest
    #[arg(short, long, global = true, default_value = "kiln.toml")]
    pub manifest: PathBuf,

    /// Target platform (linux, macos, or a system string such as x86_64-linux)
    #[arg(short, long, global = true)]
    pub platform: Option<String>,

    /// Enable a feature on top of the manifest's (repeatable)
    #[arg(short = 'F', long = "feature", global = true)]
    pub features: Vec<String>,

    /// Build timestamp (YYYYMMDD...); defaults to the manifest, then the source's mtime
    #[arg(long, global = true)]
    pub timestamp: Option<String>,

    /// Package store root used to locate dependencies
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose the derivation and run its check phase
    Check {
        /// Only parse and validate the manifest
        #[arg(long)]
        validate_only: bool,

        /// Keep the staging directory after the run
        #[arg(long)]
        keep_staging: bool,
    },

    /// Build the derivation (reusing a cached output when the plan is unchanged)
    Build {
        /// Output cache directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Keep the staging directory after the build
        #[arg(long)]
        keep_staging: bool,

        /// Do not create the `result` link next to the manifest
        #[arg(long)]
        no_link: bool,
    },

    /// Enter a development shell with the build inputs and dev tools
    DevShell {
        /// Shell to start (default: $SHELL)
        #[arg(long)]
        shell: Option<PathBuf>,

        /// Print the environment as a POSIX script instead of starting a shell
        #[arg(long)]
        print: bool,
    },

    /// Print the composed derivation as JSON
    Plan {
        /// Compact output on one line
        #[arg(long)]
        compact: bool,
    },

    /// Print the derived package version
    Version {
        /// Print the strict semver rendering
        #[arg(long)]
        semver: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
