// src/derivation/kiln.rs

//! The Kiln: cache-aware build driver
//!
//! Each derivation builds into `<out_dir>/<plan-hash>-<name>-<version>/`.
//! When that directory already holds the binary the toolchain is not run at
//! all. Otherwise the filtered source is staged into a scratch directory,
//! the toolchain runs there, and the results are installed into a partial
//! directory that is renamed into place only once complete.

use super::config::KilnConfig;
use super::toolchain::{Artifacts, BuildPlan, Toolchain};
use super::Derivation;
use crate::environment::{EnvMap, PackageLocator, StoreLocator, compose_environment};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::manifest::DEFAULT_LOCK_FILE;
use crate::source::{EntryKind, SourceTree};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Length of the plan hash prefix in output directory names
const OUT_HASH_LEN: usize = 32;

/// Plan summary written next to every build output
pub const PLAN_FILE: &str = "plan.json";

/// Run-time environment written next to every build output
pub const ENV_FILE: &str = "env.json";

/// Result of [`Kiln::build`]
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Installed binary
    pub artifact: PathBuf,
    /// Output directory holding the binary and its metadata
    pub out_path: PathBuf,
    /// Whether the output was already present
    pub from_cache: bool,
    pub plan_hash: Hash,
    /// Run-time variables the binary needs
    pub env: EnvMap,
}

pub struct Kiln<T: Toolchain> {
    config: KilnConfig,
    toolchain: T,
    locator: Box<dyn PackageLocator>,
}

impl<T: Toolchain> Kiln<T> {
    /// Create a Kiln resolving dependencies from the configured store
    pub fn new(config: KilnConfig, toolchain: T) -> Self {
        let locator = Box::new(StoreLocator::new(&config.store_root));
        Self {
            config,
            toolchain,
            locator,
        }
    }

    pub fn with_locator(config: KilnConfig, toolchain: T, locator: Box<dyn PackageLocator>) -> Self {
        Self {
            config,
            toolchain,
            locator,
        }
    }

    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    pub fn locator(&self) -> &dyn PackageLocator {
        self.locator.as_ref()
    }

    /// Output directory for a derivation
    pub fn out_path(&self, drv: &Derivation) -> PathBuf {
        let hash = drv.plan_hash();
        self.config.out_dir.join(format!(
            "{}-{}",
            hash.short(OUT_HASH_LEN),
            drv.full_name()
        ))
    }

    /// Run-time environment for a derivation's binary
    pub fn environment(&self, drv: &Derivation) -> Result<EnvMap> {
        compose_environment(drv.deps(), drv.platform(), self.locator.as_ref())
    }

    /// An existing output for this exact plan, if any
    pub fn lookup(&self, drv: &Derivation) -> Result<Option<BuildOutcome>> {
        let out_path = self.out_path(drv);
        let artifact = out_path.join("bin").join(drv.binary());
        if !artifact.is_file() {
            return Ok(None);
        }

        Ok(Some(BuildOutcome {
            artifact,
            out_path,
            from_cache: true,
            plan_hash: drv.plan_hash(),
            env: self.environment(drv)?,
        }))
    }

    /// Run only the check phase against a staged copy of the source
    pub fn check(&self, drv: &Derivation) -> Result<()> {
        let staging = self.stage(drv)?;
        let plan = BuildPlan::new(drv, staging.path(), self.environment(drv)?, self.config.jobs);
        let result = self.toolchain.check(&plan);
        self.finish_staging(staging);
        result
    }

    /// Build a derivation, reusing an existing output for the same plan
    pub fn build(&self, drv: &Derivation) -> Result<BuildOutcome> {
        if let Some(outcome) = self.lookup(drv)? {
            info!(
                "Using cached build for {} (plan: {})",
                drv.full_name(),
                outcome.plan_hash.short(16)
            );
            return Ok(outcome);
        }

        debug!("Cache miss for {}, building from source", drv.full_name());

        let env = self.environment(drv)?;
        let staging = self.stage(drv)?;
        let plan = BuildPlan::new(drv, staging.path(), env.clone(), self.config.jobs);

        info!(
            "Building {} with {} for {}",
            drv.full_name(),
            self.toolchain.name(),
            drv.platform()
        );
        let built = self.toolchain.build(&plan);
        let result = built.and_then(|artifacts| self.install(drv, &artifacts, &env));
        self.finish_staging(staging);

        let out_path = result?;
        info!("Built {} into {}", drv.full_name(), out_path.display());

        Ok(BuildOutcome {
            artifact: out_path.join("bin").join(drv.binary()),
            out_path,
            from_cache: false,
            plan_hash: drv.plan_hash(),
            env,
        })
    }

    fn stage(&self, drv: &Derivation) -> Result<TempDir> {
        let staging = stage_source(drv.source(), &self.config.out_dir)?;

        // Lock files kept outside the source root still have to reach cargo
        let staged_lock = staging.path().join(DEFAULT_LOCK_FILE);
        if !staged_lock.exists() {
            fs::copy(&drv.lock().path, &staged_lock).map_err(|e| Error::MissingLockFile {
                path: drv.lock().path.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(staging)
    }

    fn finish_staging(&self, staging: TempDir) {
        if self.config.keep_staging {
            let kept = staging.keep();
            info!("Keeping staging directory {}", kept.display());
        } else if let Err(e) = staging.close() {
            warn!("Failed to clean up staging directory: {}", e);
        }
    }

    fn install(&self, drv: &Derivation, artifacts: &Artifacts, env: &EnvMap) -> Result<PathBuf> {
        let out_path = self.out_path(drv);
        let dir_name = out_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| drv.full_name());
        let partial = self.config.out_dir.join(format!(".{}.partial", dir_name));

        if partial.exists() {
            fs::remove_dir_all(&partial)?;
        }
        fs::create_dir_all(partial.join("bin"))?;
        fs::copy(&artifacts.binary, partial.join("bin").join(drv.binary()))?;

        for (target, path) in &artifacts.extra {
            let dir = partial.join("share").join(target);
            fs::create_dir_all(&dir)?;
            if let Some(name) = path.file_name() {
                fs::copy(path, dir.join(name))?;
            }
        }

        write_json(&partial.join(PLAN_FILE), &drv.summary())?;
        if !env.is_empty() {
            write_json(&partial.join(ENV_FILE), env)?;
        }

        // A stale, incomplete output for the same plan is replaced
        if out_path.exists() {
            fs::remove_dir_all(&out_path)?;
        }
        fs::rename(&partial, &out_path)?;

        Ok(out_path)
    }
}

fn write_json<S: serde::Serialize + ?Sized>(path: &Path, value: &S) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::ParseError(format!("Failed to serialize {}: {}", path.display(), e)))?;
    fs::write(path, json)?;
    Ok(())
}

/// Copy a filtered source tree into a fresh scratch directory under `parent`
pub fn stage_source(tree: &SourceTree, parent: &Path) -> Result<TempDir> {
    fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".kiln-stage-")
        .tempdir_in(parent)?;

    for entry in tree.entries() {
        let from = tree.root().join(&entry.path);
        let to = staging.path().join(&entry.path);
        if let Some(dir) = to.parent() {
            fs::create_dir_all(dir)?;
        }

        match entry.kind {
            EntryKind::Directory => fs::create_dir_all(&to)?,
            EntryKind::File => {
                fs::copy(&from, &to)?;
            }
            EntryKind::Symlink => copy_symlink(&from, &to)?,
            EntryKind::Any => {}
        }
    }

    debug!(
        "Staged {} entries from {} into {}",
        tree.entries().len(),
        tree.root().display(),
        staging.path().display()
    );

    Ok(staging)
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, _to: &Path) -> Result<()> {
    warn!("Skipping symlink {} while staging", from.display());
    Ok(())
}
