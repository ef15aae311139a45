// src/manifest/format.rs

//! Manifest file format definitions

use super::DEFAULT_LOCK_FILE;
use crate::catalog::Dependency;
use crate::derivation::{CheckPhase, Meta};
use crate::error::Result;
use crate::platform::{FeatureSet, Platform};
use crate::source::{ExcludeRule, ExcludeRules};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A complete project manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub package: PackageSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub shell: ShellSection,
}

impl Manifest {
    /// Features enabled by the manifest
    pub fn features(&self) -> Result<FeatureSet> {
        FeatureSet::parse(&self.build.features)
    }

    /// Platforms the package declares support for (empty means all)
    pub fn platforms(&self) -> Result<Vec<Platform>> {
        let mut platforms = Vec::new();
        for tag in &self.package.platforms {
            let platform: Platform = tag.parse()?;
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        Ok(platforms)
    }

    /// Check phase policy; disabling it always carries a reason
    pub fn check_phase(&self) -> CheckPhase {
        if self.build.check {
            CheckPhase::Enabled
        } else {
            CheckPhase::Disabled {
                reason: self
                    .build
                    .check_disabled_reason
                    .clone()
                    .unwrap_or_default(),
            }
        }
    }

    /// Default source rules followed by the manifest's own
    pub fn exclude_rules(&self) -> ExcludeRules {
        ExcludeRules::with_extra(self.source.exclude.iter().cloned())
    }

    /// Lock file path, relative paths resolved against `root`
    pub fn lock_path(&self, root: &Path) -> PathBuf {
        root.join(&self.build.lock_file)
    }

    /// Custom catalog path, if any, resolved against `root`
    pub fn catalog_path(&self, root: &Path) -> Option<PathBuf> {
        self.build.catalog.as_ref().map(|c| root.join(c))
    }

    /// Extra dev-shell tools named by the manifest
    pub fn shell_tools(&self) -> Vec<Dependency> {
        self.shell.tools.iter().map(Dependency::tool).collect()
    }

    pub fn meta(&self) -> Result<Meta> {
        Ok(Meta {
            description: self.package.description.clone(),
            license: self.package.license.clone(),
            homepage: self.package.homepage.clone(),
            platforms: self.platforms()?,
        })
    }

    /// Binary the build produces; defaults to the package name
    pub fn binary(&self) -> &str {
        self.build.binary.as_deref().unwrap_or(&self.package.name)
    }
}

/// Package identity and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    /// Supported platforms; empty means every platform the catalog knows
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// Build knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    #[serde(default = "default_lock_file")]
    pub lock_file: String,

    #[serde(default)]
    pub features: Vec<String>,

    /// Run the test phase during builds
    #[serde(default = "default_check")]
    pub check: bool,

    /// Required when `check = false`
    #[serde(default)]
    pub check_disabled_reason: Option<String>,

    /// Name of the produced binary
    #[serde(default)]
    pub binary: Option<String>,

    /// Catalog file replacing the built-in one
    #[serde(default)]
    pub catalog: Option<String>,

    /// Fixed build timestamp (`YYYYMMDD...`); defaults to the source's mtime
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            lock_file: default_lock_file(),
            features: Vec::new(),
            check: true,
            check_disabled_reason: None,
            binary: None,
            catalog: None,
            timestamp: None,
        }
    }
}

fn default_lock_file() -> String {
    DEFAULT_LOCK_FILE.to_string()
}

fn default_check() -> bool {
    true
}

/// Extra source filtering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSection {
    #[serde(default)]
    pub exclude: Vec<ExcludeRule>,
}

/// Dev shell additions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellSection {
    #[serde(default)]
    pub tools: Vec<String>,
}
