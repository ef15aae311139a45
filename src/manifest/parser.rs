// src/manifest/parser.rs

//! Manifest file parsing

use crate::error::{Error, Result};
use crate::manifest::format::Manifest;
use std::path::Path;

/// Parse a manifest from a TOML string
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid manifest: {}", e)))
}

/// Parse a manifest from a file
pub fn parse_manifest_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read manifest {}: {}", path.display(), e))
    })?;

    parse_manifest(&content)
}

/// Validate a manifest, returning warnings for non-fatal gaps
pub fn validate_manifest(manifest: &Manifest) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if manifest.package.name.trim().is_empty() {
        return Err(Error::ParseError(
            "Manifest package name cannot be empty".to_string(),
        ));
    }

    manifest.platforms()?;
    manifest.features()?;

    if !manifest.build.check {
        match manifest.build.check_disabled_reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => {
                warnings.push(format!("Check phase disabled: {}", reason));
            }
            _ => {
                return Err(Error::ParseError(
                    "build.check = false requires build.check-disabled-reason".to_string(),
                ));
            }
        }
    }

    if manifest.build.lock_file.trim().is_empty() {
        return Err(Error::ParseError(
            "build.lock-file cannot be empty".to_string(),
        ));
    }

    if manifest.package.description.is_none() {
        warnings.push("Missing package description".to_string());
    }
    if manifest.package.license.is_none() {
        warnings.push("Missing package license".to_string());
    }

    Ok(warnings)
}
