// src/environment/mod.rs

//! Run-time environment composition
//!
//! A GUI binary linked against platform libraries needs to find them at run
//! time, and its file dialogs need the GSettings schemas that ship with the
//! GTK stack. On Linux this module derives:
//! - `LD_LIBRARY_PATH` from the library directories of the build inputs
//! - `GSETTINGS_SCHEMAS_PATH` from build inputs that ship run-time data
//!
//! macOS resolves frameworks through the system linker, so nothing is set
//! there. Each variable is emitted only when it would be non-empty.

use crate::catalog::{Dependency, DependencyKind, DependencySet};
use crate::error::{Error, Result};
use crate::platform::Platform;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Dynamic loader search path
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Directories holding compiled GSettings schemas
pub const SCHEMAS_PATH_VAR: &str = "GSETTINGS_SCHEMAS_PATH";

/// XDG data search path, extended by the dev shell hook
pub const DATA_DIRS_VAR: &str = "XDG_DATA_DIRS";

pub const PATH_VAR: &str = "PATH";

/// Ordered map of environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvMap(BTreeMap<String, String>);

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of this map
    pub fn overlay(&mut self, other: &EnvMap) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Prepend `dirs` to a search-path variable, keeping any existing value
    pub fn prepend_path(&mut self, key: &str, dirs: &[PathBuf]) -> Result<()> {
        if dirs.is_empty() {
            return Ok(());
        }
        let mut joined = join_search_path(dirs)?;
        if let Some(existing) = self.get(key).filter(|v| !v.is_empty()) {
            joined.push(SEARCH_PATH_SEPARATOR);
            joined.push_str(existing);
        }
        self.insert(key, joined);
        Ok(())
    }
}

impl FromIterator<(String, String)> for EnvMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a EnvMap {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(windows)]
const SEARCH_PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const SEARCH_PATH_SEPARATOR: char = ':';

/// Join directories into one search-path value
pub fn join_search_path(dirs: &[PathBuf]) -> Result<String> {
    let joined = std::env::join_paths(dirs)
        .map_err(|e| Error::ParseError(format!("Cannot build search path: {}", e)))?;
    joined
        .into_string()
        .map_err(|raw| Error::ParseError(format!("Search path is not UTF-8: {:?}", raw)))
}

/// Maps a dependency to where it is installed
///
/// Only `prefix` is required; the directory layout below a prefix follows
/// the usual `lib`/`bin`/`share` convention.
pub trait PackageLocator {
    /// Installation prefix, or `None` when the dependency has no files of its own
    fn prefix(&self, dep: &Dependency) -> Option<PathBuf>;

    fn lib_dir(&self, dep: &Dependency) -> Option<PathBuf> {
        match dep.kind {
            DependencyKind::Library => self.prefix(dep).map(|p| p.join("lib")),
            _ => None,
        }
    }

    fn bin_dir(&self, dep: &Dependency) -> Option<PathBuf> {
        match dep.kind {
            DependencyKind::Tool | DependencyKind::Hook => self.prefix(dep).map(|p| p.join("bin")),
            _ => None,
        }
    }

    fn schema_dir(&self, dep: &Dependency) -> Option<PathBuf> {
        if !dep.provides_data {
            return None;
        }
        self.prefix(dep)
            .map(|p| p.join("share").join("gsettings-schemas").join(&dep.name))
    }
}

/// Locator for a flat store: `<root>/<name>` per dependency
#[derive(Debug, Clone)]
pub struct StoreLocator {
    root: PathBuf,
}

impl StoreLocator {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PackageLocator for StoreLocator {
    fn prefix(&self, dep: &Dependency) -> Option<PathBuf> {
        match dep.kind {
            // Frameworks come from the platform SDK
            DependencyKind::Framework => None,
            _ => Some(self.root.join(&dep.name)),
        }
    }
}

/// Run-time variables for a binary built against `deps` on `platform`
pub fn compose_environment(
    deps: &DependencySet,
    platform: Platform,
    locator: &dyn PackageLocator,
) -> Result<EnvMap> {
    let mut env = EnvMap::new();

    if !platform.uses_library_path() {
        debug!("No run-time environment needed on {}", platform);
        return Ok(env);
    }

    // Every build input must contribute to the search path
    let lib_dirs = deps
        .build_inputs
        .iter()
        .map(|d| {
            locator.lib_dir(d).ok_or_else(|| {
                Error::NotFound(format!(
                    "Library directory for build input '{}' on {}",
                    d.name, platform
                ))
            })
        })
        .collect::<Result<Vec<PathBuf>>>()?;
    if !lib_dirs.is_empty() {
        env.insert(LIBRARY_PATH_VAR, join_search_path(&lib_dirs)?);
    }

    let schema_dirs: Vec<PathBuf> = deps
        .build_inputs
        .iter()
        .filter_map(|d| locator.schema_dir(d))
        .collect();
    if !schema_dirs.is_empty() {
        env.insert(SCHEMAS_PATH_VAR, join_search_path(&schema_dirs)?);
    }

    debug!(
        "Composed {} run-time variables from {} library and {} schema directories",
        env.len(),
        lib_dirs.len(),
        schema_dirs.len()
    );

    Ok(env)
}
