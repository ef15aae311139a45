// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr so `kiln plan` and `dev-shell --print` stay pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project = &cli.project;

    match cli.command {
        Commands::Check {
            validate_only,
            keep_staging,
        } => commands::cmd_check(project, validate_only, keep_staging),
        Commands::Build {
            out_dir,
            jobs,
            keep_staging,
            no_link,
        } => commands::cmd_build(project, out_dir.as_deref(), jobs, keep_staging, no_link),
        Commands::DevShell { shell, print } => {
            commands::cmd_dev_shell(project, shell.as_deref(), print)
        }
        Commands::Plan { compact } => commands::cmd_plan(project, compact),
        Commands::Version { semver } => commands::cmd_version(project, semver),
        Commands::Completions { shell } => commands::cmd_completions(shell),
    }
}
