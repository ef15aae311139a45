// src/derivation/mod.rs

//! Derivations: immutable, fully resolved build plans
//!
//! A [`Derivation`] ties together everything a toolchain needs to produce
//! the artifact: identity and version, the filtered source tree, the
//! platform-resolved dependency set, the pinned lock file, package metadata
//! and the check phase policy. Composition validates its preconditions
//! before anything is built:
//! - the source tree holds at least one file
//! - the lock file exists and is readable (it is hashed, never resolved)
//! - the platform is one the package declares support for
//!
//! Building is delegated to a [`Toolchain`] through a [`Kiln`], which keys
//! output directories by [`Derivation::plan_hash`] and skips the toolchain
//! when the output already exists.

mod config;
mod kiln;
mod toolchain;

pub use config::KilnConfig;
pub use kiln::{BuildOutcome, Kiln, stage_source};
pub use toolchain::{Artifacts, BuildPlan, CargoToolchain, Toolchain};

use crate::catalog::DependencySet;
use crate::error::{Error, Result};
use crate::hash::{Hash, HashAlgorithm, Hasher, hash_bytes};
use crate::platform::{FeatureSet, Platform};
use crate::source::SourceTree;
use crate::version::VersionInfo;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Whether the build runs the package's test suite
///
/// Enabled unless a manifest opts out, and opting out always names a reason
/// so the relaxation shows up in logs and plans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CheckPhase {
    #[default]
    Enabled,
    Disabled { reason: String },
}

impl CheckPhase {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Post-build package metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub description: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    /// Supported platforms; empty means unrestricted
    pub platforms: Vec<Platform>,
}

/// A read, hashed lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockRef {
    pub path: PathBuf,
    pub hash: Hash,
    pub size: u64,
}

impl LockRef {
    /// Read and hash a lock file; anything unreadable is `MissingLockFile`
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::MissingLockFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            hash: hash_bytes(HashAlgorithm::Sha256, &bytes),
            size: bytes.len() as u64,
        })
    }
}

/// Inputs to [`Composition::compose`]
#[derive(Debug, Clone)]
pub struct Composition {
    pub name: String,
    pub platform: Platform,
    pub version: VersionInfo,
    pub features: FeatureSet,
    pub source: SourceTree,
    pub deps: DependencySet,
    pub lock_file: PathBuf,
    pub meta: Meta,
    pub check: CheckPhase,
    /// Produced binary; defaults to `name`
    pub binary: Option<String>,
}

impl Composition {
    /// Validate the inputs and freeze them into a [`Derivation`]
    pub fn compose(self) -> Result<Derivation> {
        if self.name.trim().is_empty() {
            return Err(Error::ParseError(
                "Derivation name cannot be empty".to_string(),
            ));
        }

        if !self.meta.platforms.is_empty() && !self.meta.platforms.contains(&self.platform) {
            warn!(
                "Package {} does not declare support for {}",
                self.name, self.platform
            );
            return Err(Error::UnsupportedPlatform {
                platform: self.platform.to_string(),
            });
        }

        if self.source.is_empty() {
            return Err(Error::EmptySource {
                root: self.source.root().to_path_buf(),
            });
        }

        if let CheckPhase::Disabled { reason } = &self.check {
            if reason.trim().is_empty() {
                return Err(Error::ParseError(format!(
                    "Check phase for {} is disabled without a reason",
                    self.name
                )));
            }
            warn!("Check phase disabled for {}: {}", self.name, reason);
        }

        let lock = LockRef::open(&self.lock_file)?;

        let binary = self.binary.unwrap_or_else(|| self.name.clone());
        let derivation = Derivation {
            name: self.name,
            platform: self.platform,
            version: self.version,
            features: self.features,
            source: self.source,
            deps: self.deps,
            lock,
            meta: self.meta,
            check: self.check,
            binary,
        };

        info!(
            "Composed {} {} for {} ({} inputs, plan {})",
            derivation.name,
            derivation.version,
            derivation.platform,
            derivation.deps.len(),
            derivation.plan_hash().short(16)
        );

        Ok(derivation)
    }
}

/// Compose a derivation with the check phase enabled and no features
pub fn compose(
    name: &str,
    platform: Platform,
    version: VersionInfo,
    source: SourceTree,
    deps: DependencySet,
    lock_file: &Path,
    meta: Meta,
) -> Result<Derivation> {
    Composition {
        name: name.to_string(),
        platform,
        version,
        features: FeatureSet::new(),
        source,
        deps,
        lock_file: lock_file.to_path_buf(),
        meta,
        check: CheckPhase::Enabled,
        binary: None,
    }
    .compose()
}

/// An immutable build plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    name: String,
    platform: Platform,
    version: VersionInfo,
    features: FeatureSet,
    source: SourceTree,
    deps: DependencySet,
    lock: LockRef,
    meta: Meta,
    check: CheckPhase,
    binary: String,
}

impl Derivation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn version(&self) -> VersionInfo {
        self.version
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn source(&self) -> &SourceTree {
        &self.source
    }

    pub fn deps(&self) -> &DependencySet {
        &self.deps
    }

    pub fn lock(&self) -> &LockRef {
        &self.lock
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn check_phase(&self) -> &CheckPhase {
        &self.check
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// `name-version`, used in output directory names
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Hash over every input that can change the produced artifact
    ///
    /// Metadata and the reason for a disabled check phase are left out:
    /// editing them does not change what gets built.
    pub fn plan_hash(&self) -> Hash {
        let mut hasher = Hasher::new(HashAlgorithm::Sha256);
        hasher.update_field(b"kiln-plan-v1");
        hasher.update_field(self.name.as_bytes());
        hasher.update_field(self.version.to_string().as_bytes());
        hasher.update_field(self.platform.as_str().as_bytes());
        for feature in self.features.iter() {
            hasher.update_field(feature.as_str().as_bytes());
        }
        hasher.update_field(self.source.fingerprint().to_prefixed_string().as_bytes());

        for dep in &self.deps.native_build_inputs {
            hasher.update_field(format!("native:{}:{:?}", dep.name, dep.kind).as_bytes());
        }
        for dep in &self.deps.build_inputs {
            hasher.update_field(format!("build:{}:{:?}", dep.name, dep.kind).as_bytes());
        }
        for target in &self.deps.toolchain.extra_targets {
            hasher.update_field(format!("target:{}", target).as_bytes());
        }

        hasher.update_field(self.lock.hash.to_prefixed_string().as_bytes());
        hasher.update_field(if self.check.is_enabled() { b"check:on" } else { b"check:off" });
        hasher.update_field(self.binary.as_bytes());
        hasher.finalize()
    }

    /// Serializable view of the plan, as printed by `kiln plan`
    pub fn summary(&self) -> PlanSummary<'_> {
        PlanSummary {
            name: &self.name,
            version: self.version.to_string(),
            platform: self.platform,
            features: &self.features,
            plan_hash: self.plan_hash().to_prefixed_string(),
            source: SourceSummary {
                root: self.source.root(),
                files: self.source.file_count(),
                bytes: self.source.total_size(),
                fingerprint: self.source.fingerprint().to_prefixed_string(),
            },
            deps: &self.deps,
            lock: &self.lock,
            meta: &self.meta,
            check: &self.check,
            binary: &self.binary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanSummary<'a> {
    pub name: &'a str,
    pub version: String,
    pub platform: Platform,
    pub features: &'a FeatureSet,
    pub plan_hash: String,
    pub source: SourceSummary<'a>,
    pub deps: &'a DependencySet,
    pub lock: &'a LockRef,
    pub meta: &'a Meta,
    pub check: &'a CheckPhase,
    pub binary: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SourceSummary<'a> {
    pub root: &'a Path,
    pub files: usize,
    pub bytes: u64,
    pub fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::source::{ExcludeRules, filter_source};
    use crate::version::derive_version;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("Cargo.lock"), "version = 3\n").unwrap();
        dir
    }

    fn composition(dir: &TempDir) -> Composition {
        let platform = Platform::Linux;
        let features = FeatureSet::new();
        Composition {
            name: "nes-emu".to_string(),
            platform,
            version: derive_version("20240115").unwrap(),
            deps: Catalog::builtin().resolve(platform, &features).unwrap(),
            features,
            source: filter_source(dir.path(), &ExcludeRules::default()).unwrap(),
            lock_file: dir.path().join("Cargo.lock"),
            meta: Meta {
                license: Some("MIT".to_string()),
                platforms: vec![Platform::Linux, Platform::Macos],
                ..Default::default()
            },
            check: CheckPhase::Enabled,
            binary: None,
        }
    }

    #[test]
    fn test_compose_valid() {
        let dir = project();
        let drv = composition(&dir).compose().unwrap();
        assert_eq!(drv.name(), "nes-emu");
        assert_eq!(drv.binary(), "nes-emu");
        assert_eq!(drv.full_name(), "nes-emu-0.pre+date=2024-01-15");
        assert!(drv.check_phase().is_enabled());
        assert_eq!(drv.lock().size, 12);
    }

    #[test]
    fn test_missing_lock_file() {
        let dir = project();
        let mut input = composition(&dir);
        input.lock_file = dir.path().join("missing.lock");
        match input.compose() {
            Err(Error::MissingLockFile { path, .. }) => {
                assert_eq!(path, dir.path().join("missing.lock"))
            }
            other => panic!("expected MissingLockFile, got {:?}", other),
        }
    }

    #[test]
    fn test_lock_file_that_is_a_directory() {
        let dir = project();
        let mut input = composition(&dir);
        input.lock_file = dir.path().join("src");
        assert!(matches!(
            input.compose(),
            Err(Error::MissingLockFile { .. })
        ));
    }

    #[test]
    fn test_empty_source_rejected() {
        let dir = project();
        let empty = tempfile::tempdir().unwrap();
        let mut input = composition(&dir);
        input.source = filter_source(empty.path(), &ExcludeRules::default()).unwrap();
        assert!(matches!(input.compose(), Err(Error::EmptySource { .. })));
    }

    #[test]
    fn test_platform_outside_meta_rejected() {
        let dir = project();
        let mut input = composition(&dir);
        input.meta.platforms = vec![Platform::Macos];
        assert!(matches!(
            input.compose(),
            Err(Error::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_disabled_check_needs_reason() {
        let dir = project();
        for reason in ["", "   "] {
            let mut input = composition(&dir);
            input.check = CheckPhase::Disabled {
                reason: reason.to_string(),
            };
            match input.compose() {
                Err(Error::ParseError(msg)) => assert!(msg.contains("without a reason")),
                other => panic!("expected ParseError, got {:?}", other),
            }
        }

        // Checked before touching the lock file
        let mut input = composition(&dir);
        input.lock_file = dir.path().join("missing.lock");
        input.check = CheckPhase::Disabled {
            reason: String::new(),
        };
        assert!(matches!(input.compose(), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_plan_hash_tracks_build_inputs_only() {
        let dir = project();
        let base = composition(&dir).compose().unwrap().plan_hash();

        let mut input = composition(&dir);
        input.meta.description = Some("now documented".to_string());
        assert_eq!(input.compose().unwrap().plan_hash(), base);

        let mut input = composition(&dir);
        input.check = CheckPhase::Disabled {
            reason: "flaky on CI".to_string(),
        };
        assert_ne!(input.compose().unwrap().plan_hash(), base);

        let mut input = composition(&dir);
        input.deps = Catalog::builtin()
            .resolve(
                Platform::Linux,
                &FeatureSet::new().with(crate::platform::Feature::GtkFilePicker),
            )
            .unwrap();
        assert_ne!(input.compose().unwrap().plan_hash(), base);

        fs::write(dir.path().join("Cargo.lock"), "version = 4\n").unwrap();
        assert_ne!(composition(&dir).compose().unwrap().plan_hash(), base);
    }

    #[test]
    fn test_summary_serializes() {
        let dir = project();
        let drv = composition(&dir).compose().unwrap();
        let json = serde_json::to_value(drv.summary()).unwrap();
        assert_eq!(json["version"], "0.pre+date=2024-01-15");
        assert_eq!(json["platform"], "linux");
        assert_eq!(json["check"]["state"], "enabled");
        assert_eq!(json["source"]["files"], 2);
    }

    #[test]
    fn test_compose_free_function() {
        let dir = project();
        let input = composition(&dir);
        let drv = compose(
            "nes-emu",
            input.platform,
            input.version,
            input.source,
            input.deps,
            &input.lock_file,
            input.meta,
        )
        .unwrap();
        assert!(drv.features().is_empty());
    }
}
