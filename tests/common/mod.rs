// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use kiln::catalog::Catalog;
use kiln::derivation::{CheckPhase, Composition, Derivation, Meta};
use kiln::platform::{FeatureSet, Platform};
use kiln::source::{ExcludeRules, filter_source};
use kiln::version::derive_version;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const SAMPLE_MANIFEST: &str = r#"[package]
name = "nes-emu"
description = "A NES emulator"
license = "MIT"
platforms = ["x86_64-linux", "aarch64-linux", "x86_64-darwin", "aarch64-darwin"]

[build]
lock-file = "Cargo.lock"
"#;

/// Create a small emulator-shaped project tree.
///
/// Includes build output and descriptor files that filtering must drop.
/// Returns the TempDir; keep it alive to prevent cleanup.
pub fn sample_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("src/cpu")).unwrap();
    fs::create_dir_all(root.join("src/gui")).unwrap();
    fs::create_dir_all(root.join("target/release")).unwrap();

    fs::write(
        root.join("Cargo.toml"),
        "[package]\nname = \"nes-emu\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
    )
    .unwrap();
    fs::write(root.join("Cargo.lock"), "# pinned\nversion = 3\n").unwrap();
    fs::write(root.join("kiln.toml"), SAMPLE_MANIFEST).unwrap();
    fs::write(root.join("src/main.rs"), "mod cpu;\nmod gui;\nfn main() {}\n").unwrap();
    fs::write(root.join("src/cpu/mod.rs"), "pub struct Cpu;\n").unwrap();
    fs::write(root.join("src/gui/mod.rs"), "pub fn open_rom() {}\n").unwrap();
    fs::write(root.join("target/release/nes-emu"), "stale binary").unwrap();

    dir
}

/// Compose a derivation for `root` with the built-in catalog.
pub fn compose_for(root: &Path, platform: Platform, features: FeatureSet) -> Derivation {
    composition_for(root, platform, features).compose().unwrap()
}

/// Inputs for composing `root`, for tests that tweak one field.
pub fn composition_for(root: &Path, platform: Platform, features: FeatureSet) -> Composition {
    Composition {
        name: "nes-emu".to_string(),
        platform,
        version: derive_version("20240115T103000").unwrap(),
        deps: Catalog::builtin().resolve(platform, &features).unwrap(),
        features,
        source: filter_source(root, &ExcludeRules::default()).unwrap(),
        lock_file: root.join("Cargo.lock"),
        meta: Meta {
            description: Some("A NES emulator".to_string()),
            license: Some("MIT".to_string()),
            homepage: None,
            platforms: vec![Platform::Linux, Platform::Macos],
        },
        check: CheckPhase::Enabled,
        binary: None,
    }
}
