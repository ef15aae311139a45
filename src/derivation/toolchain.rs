// src/derivation/toolchain.rs

//! Language toolchain seam
//!
//! A [`Toolchain`] turns a staged source tree into a binary. The only
//! implementation shipped is [`CargoToolchain`], which always builds with
//! `--locked` so the lock file pinned in the derivation is honoured exactly.

use super::{CheckPhase, Derivation};
use crate::environment::EnvMap;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, info, warn};

/// Number of trailing stderr lines kept as build diagnostics
const DIAGNOSTIC_LINES: usize = 60;

/// Everything a toolchain needs for one run
#[derive(Debug)]
pub struct BuildPlan<'a> {
    pub derivation: &'a Derivation,
    /// Staged copy of the filtered source
    pub workdir: PathBuf,
    /// Where the toolchain writes intermediate output
    pub target_dir: PathBuf,
    /// Extra variables for the toolchain process
    pub env: EnvMap,
    pub jobs: u32,
}

impl<'a> BuildPlan<'a> {
    pub fn new(derivation: &'a Derivation, workdir: &Path, env: EnvMap, jobs: u32) -> Self {
        Self {
            derivation,
            workdir: workdir.to_path_buf(),
            target_dir: workdir.join(crate::source::BUILD_OUTPUT_DIR),
            env,
            jobs,
        }
    }
}

/// Files produced by a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// The host binary
    pub binary: PathBuf,
    /// Outputs for extra targets, keyed by target triple
    pub extra: Vec<(String, PathBuf)>,
}

pub trait Toolchain {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Run only the check phase
    fn check(&self, plan: &BuildPlan<'_>) -> Result<()>;

    /// Build the binary (and extra targets), then run the check phase if enabled
    fn build(&self, plan: &BuildPlan<'_>) -> Result<Artifacts>;
}

/// Cargo-driven builds
#[derive(Debug, Clone)]
pub struct CargoToolchain {
    cargo: PathBuf,
}

impl CargoToolchain {
    pub fn new(cargo: &Path) -> Self {
        Self {
            cargo: cargo.to_path_buf(),
        }
    }

    /// Find `cargo` on `PATH`
    pub fn locate() -> Result<Self> {
        let cargo = which::which("cargo")
            .map_err(|e| Error::NotFound(format!("cargo not found on PATH: {}", e)))?;
        debug!("Using cargo at {}", cargo.display());
        Ok(Self::new(&cargo))
    }

    pub fn cargo(&self) -> &Path {
        &self.cargo
    }

    fn run(&self, phase: &str, plan: &BuildPlan<'_>, args: Vec<OsString>) -> Result<()> {
        info!("Running {} phase for {}", phase, plan.derivation.full_name());
        debug!("{} {:?}", self.cargo.display(), args);

        let output = Command::new(&self.cargo)
            .args(&args)
            .current_dir(&plan.workdir)
            .envs(plan.env.iter())
            .env("CARGO_TARGET_DIR", &plan.target_dir)
            .output()
            .map_err(|e| Error::IoError(format!("Failed to run {} phase: {}", phase, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            debug!("[{}] {}", phase, line);
        }

        if !output.status.success() {
            return Err(status_error(phase, output.status, &stderr));
        }

        Ok(())
    }

    fn common_args(subcommand: &str, plan: &BuildPlan<'_>) -> Vec<OsString> {
        vec![
            subcommand.into(),
            "--release".into(),
            "--locked".into(),
            "--jobs".into(),
            plan.jobs.max(1).to_string().into(),
        ]
    }
}

impl Toolchain for CargoToolchain {
    fn name(&self) -> &str {
        "cargo"
    }

    fn check(&self, plan: &BuildPlan<'_>) -> Result<()> {
        self.run("check", plan, Self::common_args("test", plan))
    }

    fn build(&self, plan: &BuildPlan<'_>) -> Result<Artifacts> {
        let drv = plan.derivation;

        let mut args = Self::common_args("build", plan);
        args.extend(["--bin".into(), drv.binary().into()]);
        self.run("build", plan, args)?;

        let binary = plan
            .target_dir
            .join("release")
            .join(format!("{}{}", drv.binary(), std::env::consts::EXE_SUFFIX));
        if !binary.is_file() {
            return Err(Error::BuildFailure {
                diagnostics: format!("expected artifact {} was not produced", binary.display()),
                status: "build phase exited successfully".to_string(),
            });
        }

        let mut extra = Vec::new();
        for target in &drv.deps().toolchain.extra_targets {
            let mut args = Self::common_args("build", plan);
            args.extend(["--target".into(), target.into()]);
            self.run(&format!("build ({})", target), plan, args)?;

            let dir = plan.target_dir.join(target).join("release");
            let wasm = dir.join(format!("{}.wasm", drv.binary()));
            let output = if wasm.is_file() { wasm } else { dir.join(drv.binary()) };
            if output.is_file() {
                extra.push((target.clone(), output));
            } else {
                debug!("No artifact for {} at {}", target, output.display());
            }
        }

        match drv.check_phase() {
            CheckPhase::Enabled => self.check(plan)?,
            CheckPhase::Disabled { reason } => {
                warn!("Skipping check phase for {}: {}", drv.full_name(), reason);
            }
        }

        Ok(Artifacts { binary, extra })
    }
}

/// Map a failed exit status to the matching error
///
/// Termination by SIGINT, SIGTERM, SIGHUP or SIGQUIT means the run was
/// interrupted rather than broken; any other failure carries the tail of
/// stderr as diagnostics.
pub(crate) fn status_error(phase: &str, status: ExitStatus, stderr: &str) -> Error {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;
        use std::os::unix::process::ExitStatusExt;

        if let Some(raw) = status.signal() {
            return match Signal::try_from(raw) {
                Ok(sig @ (Signal::SIGINT | Signal::SIGTERM | Signal::SIGHUP | Signal::SIGQUIT)) => {
                    Error::Interrupted {
                        signal: sig.as_str().to_string(),
                    }
                }
                Ok(sig) => Error::BuildFailure {
                    diagnostics: diagnostics(stderr),
                    status: format!("{} phase killed by {}", phase, sig.as_str()),
                },
                Err(_) => Error::BuildFailure {
                    diagnostics: diagnostics(stderr),
                    status: format!("{} phase killed by signal {}", phase, raw),
                },
            };
        }
    }

    Error::BuildFailure {
        diagnostics: diagnostics(stderr),
        status: match status.code() {
            Some(code) => format!("{} phase exited with code {}", phase, code),
            None => format!("{} phase exited abnormally", phase),
        },
    }
}

fn diagnostics(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}
