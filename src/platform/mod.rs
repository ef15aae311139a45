// src/platform/mod.rs

//! Target platforms and feature flags
//!
//! Every composition step takes a [`Platform`] explicitly. The host is only
//! consulted by [`Platform::host`], which the CLI calls once per invocation.
//!
//! Accepted spellings:
//! - OS tags: `linux`, `macos`, `darwin`
//! - Nix system strings: `x86_64-linux`, `aarch64-darwin`
//! - Rust target triples: `x86_64-unknown-linux-gnu`, `aarch64-apple-darwin`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A host platform the catalog knows how to build for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Macos,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Linux, Platform::Macos];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
        }
    }

    /// The platform this process runs on
    pub fn host() -> Result<Self> {
        Self::from_str(std::env::consts::OS)
    }

    /// Whether the dynamic loader honors `LD_LIBRARY_PATH`
    pub fn uses_library_path(&self) -> bool {
        matches!(self, Self::Linux)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "linux" => return Ok(Self::Linux),
            "macos" | "darwin" => return Ok(Self::Macos),
            _ => {}
        }

        // Nix `<arch>-<os>` or Rust `<arch>-<vendor>-<os>[-<env>]`
        let parts: Vec<&str> = normalized.split('-').collect();
        let os_at = match parts.as_slice() {
            [_, os, ..] if is_known_os(os) => Some(1),
            [_, _, os, ..] if is_known_os(os) => Some(2),
            _ => None,
        };
        if let Some(idx) = os_at {
            let env = &parts[idx + 1..];
            match parts[idx] {
                "linux" if !env.iter().any(|e| e.starts_with("android")) => {
                    return Ok(Self::Linux);
                }
                "darwin" | "macos" => return Ok(Self::Macos),
                _ => {}
            }
        }

        Err(Error::UnsupportedPlatform {
            platform: s.to_string(),
        })
    }
}

fn is_known_os(part: &str) -> bool {
    matches!(part, "linux" | "darwin" | "macos")
}

/// Optional build features that change the dependency set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Native GTK file dialog on Linux
    #[serde(rename = "gtk-file-picker")]
    GtkFilePicker,
    /// WebAssembly build target
    #[serde(rename = "wasm")]
    Wasm,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GtkFilePicker => "gtk-file-picker",
            Self::Wasm => "wasm",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "gtk-file-picker" | "gtk_file_picker" => Ok(Self::GtkFilePicker),
            "wasm" => Ok(Self::Wasm),
            other => Err(Error::UnknownFeature(other.to_string())),
        }
    }
}

/// An ordered set of enabled features
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of feature names, rejecting unknown ones
    pub fn parse<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<Feature>())
            .collect()
    }

    pub fn with(mut self, feature: Feature) -> Self {
        self.0.insert(feature);
        self
    }

    pub fn insert(&mut self, feature: Feature) -> bool {
        self.0.insert(feature)
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Feature> for FeatureSet {
    fn extend<T: IntoIterator<Item = Feature>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Feature::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
