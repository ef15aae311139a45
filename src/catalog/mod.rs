// src/catalog/mod.rs

//! Platform dependency catalog
//!
//! The catalog is a tagged table: each entry names the platform and feature
//! it applies to and the native dependencies it contributes. Resolution
//! walks the table in order and keeps every entry whose tags match, so
//! adding a platform or feature means adding rows, not branches.
//!
//! Two variants are resolved from the same table:
//! - **Production**: what a build links against (`resolve`)
//! - **Development**: extra tools for interactive shells (`dev_tools`)
//!
//! # Catalog file format
//!
//! ```toml
//! [[entry]]
//! platform = "linux"
//! feature = "gtk-file-picker"
//! native = [{ name = "wrapGAppsHook", kind = "hook" }]
//! build = [{ name = "gtk3", kind = "library", provides-data = true }]
//!
//! [[entry]]
//! feature = "wasm"
//! targets = ["wasm32-unknown-unknown"]
//! ```

mod builtin;

use crate::error::{Error, Result};
use crate::platform::{Feature, FeatureSet, Platform};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// What kind of artifact a dependency is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// Shared library needed at link and/or run time
    Library,
    /// Opaque platform SDK framework (macOS)
    Framework,
    /// Executable used during the build or in a shell
    Tool,
    /// Build step that post-processes the produced binary
    Hook,
}

/// A single native dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,
    /// Ships data (e.g. GSettings schemas) that GUI dialogs look up at run time
    #[serde(default)]
    pub provides_data: bool,
}

impl Dependency {
    pub fn new(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            provides_data: false,
        }
    }

    pub fn library(name: impl Into<String>) -> Self {
        Self::new(name, DependencyKind::Library)
    }

    pub fn framework(name: impl Into<String>) -> Self {
        Self::new(name, DependencyKind::Framework)
    }

    pub fn tool(name: impl Into<String>) -> Self {
        Self::new(name, DependencyKind::Tool)
    }

    pub fn hook(name: impl Into<String>) -> Self {
        Self::new(name, DependencyKind::Hook)
    }

    /// Mark this dependency as shipping run-time data
    pub fn with_data(mut self) -> Self {
        self.provides_data = true;
        self
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Which resolution an entry takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Production,
    Development,
}

/// One row of the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Platform tag; `None` applies to every platform
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Feature gate; `None` is always on
    #[serde(default)]
    pub feature: Option<Feature>,
    /// Restrict the row to one variant; `None` contributes to both
    #[serde(default)]
    pub only: Option<Variant>,
    /// Tools needed while compiling and linking
    #[serde(default)]
    pub native: Vec<Dependency>,
    /// Libraries needed at link and run time
    #[serde(default)]
    pub build: Vec<Dependency>,
    /// Extra compilation targets for the language toolchain
    #[serde(default)]
    pub targets: Vec<String>,
}

impl CatalogEntry {
    fn applies(&self, platform: Platform, features: &FeatureSet, variant: Variant) -> bool {
        self.platform.is_none_or(|p| p == platform)
            && self.feature.is_none_or(|f| features.contains(f))
            && self.only.is_none_or(|v| v == variant)
    }
}

/// Toolchain configuration requested by the resolved features
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolchainSpec {
    /// Targets compiled alongside the host target
    pub extra_targets: Vec<String>,
}

/// Platform-resolved native dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencySet {
    pub native_build_inputs: Vec<Dependency>,
    pub build_inputs: Vec<Dependency>,
    pub toolchain: ToolchainSpec,
}

impl DependencySet {
    /// Whether a dependency with this name is in either partition
    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|d| d.name == name)
    }

    /// Native inputs followed by build inputs
    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.native_build_inputs.iter().chain(self.build_inputs.iter())
    }

    pub fn len(&self) -> usize {
        self.native_build_inputs.len() + self.build_inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn absorb(&mut self, entry: &CatalogEntry) {
        push_unique(&mut self.native_build_inputs, &entry.native);
        push_unique(&mut self.build_inputs, &entry.build);
        for target in &entry.targets {
            if !self.toolchain.extra_targets.contains(target) {
                self.toolchain.extra_targets.push(target.clone());
            }
        }
    }
}

fn push_unique(into: &mut Vec<Dependency>, from: &[Dependency]) {
    for dep in from {
        if !into.iter().any(|d| d.name == dep.name) {
            into.push(dep.clone());
        }
    }
}

/// The dependency table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "entry", default)]
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog from rows, checking the platform partition invariant
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let catalog = Self { entries };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog for the emulator's GUI stack
    pub fn builtin() -> Self {
        Self {
            entries: builtin::entries(),
        }
    }

    /// Parse a catalog from TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(content)
            .map_err(|e| Error::ParseError(format!("Invalid catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Platforms with at least one platform-specific row
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.supports(*p))
            .collect()
    }

    pub fn supports(&self, platform: Platform) -> bool {
        self.entries.iter().any(|e| e.platform == Some(platform))
    }

    /// Linux build rows hold libraries only, and a dependency may not be
    /// both Linux-only and macOS-only
    pub fn validate(&self) -> Result<()> {
        // Linux build inputs feed the library search path, so each one must
        // be a library
        if let Some(dep) = self
            .entries
            .iter()
            .filter(|e| e.platform.is_none_or(|p| p == Platform::Linux))
            .filter(|e| e.only != Some(Variant::Development))
            .flat_map(|e| e.build.iter())
            .find(|d| d.kind != DependencyKind::Library)
        {
            return Err(Error::ParseError(format!(
                "Catalog build input '{}' applies to linux but is a {:?}, not a library",
                dep.name, dep.kind
            )));
        }

        let names_for = |platform: Platform| -> HashSet<&str> {
            self.entries
                .iter()
                .filter(|e| e.platform == Some(platform))
                .flat_map(|e| e.native.iter().chain(e.build.iter()))
                .map(|d| d.name.as_str())
                .collect()
        };

        let linux = names_for(Platform::Linux);
        let macos = names_for(Platform::Macos);
        let mut shared: Vec<&str> = linux.intersection(&macos).copied().collect();
        shared.sort_unstable();

        match shared.first() {
            Some(name) => Err(Error::CatalogConflict {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Resolve the production dependency set for a platform
    pub fn resolve(&self, platform: Platform, features: &FeatureSet) -> Result<DependencySet> {
        self.resolve_variant(platform, features, Variant::Production)
    }

    /// Development-only tools for a platform, in catalog order
    pub fn dev_tools(&self, platform: Platform, features: &FeatureSet) -> Result<Vec<Dependency>> {
        self.ensure_supported(platform)?;

        let mut tools = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.only == Some(Variant::Development))
            .filter(|e| e.applies(platform, features, Variant::Development))
        {
            push_unique(&mut tools, &entry.native);
            push_unique(&mut tools, &entry.build);
        }
        Ok(tools)
    }

    /// Resolve every row applying to `variant`
    pub fn resolve_variant(
        &self,
        platform: Platform,
        features: &FeatureSet,
        variant: Variant,
    ) -> Result<DependencySet> {
        self.ensure_supported(platform)?;

        let mut set = DependencySet::default();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.applies(platform, features, variant))
        {
            set.absorb(entry);
        }

        debug!(
            "Resolved {} native and {} build inputs for {} {} ({:?})",
            set.native_build_inputs.len(),
            set.build_inputs.len(),
            platform,
            features,
            variant
        );

        Ok(set)
    }

    fn ensure_supported(&self, platform: Platform) -> Result<()> {
        if self.supports(platform) {
            Ok(())
        } else {
            Err(Error::UnsupportedPlatform {
                platform: platform.to_string(),
            })
        }
    }
}

/// Resolve a platform tag against the built-in catalog
///
/// Unknown tags fail with `UnsupportedPlatform`; there is no empty fallback.
pub fn resolve_dependencies(platform: &str, features: &FeatureSet) -> Result<DependencySet> {
    let platform: Platform = platform.parse()?;
    Catalog::builtin().resolve(platform, features)
}
