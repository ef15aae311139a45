// src/manifest/mod.rs

//! Project manifest (`kiln.toml`)
//!
//! The manifest names the package and the build knobs that are not derived
//! from the source tree itself: enabled features, the lock file, the check
//! phase policy and extra dev-shell tools.
//!
//! # Example Manifest
//!
//! ```toml
//! [package]
//! name = "nes-emu"
//! description = "A NES emulator"
//! license = "MIT"
//! platforms = ["linux", "macos"]
//!
//! [build]
//! lock-file = "Cargo.lock"
//! features = ["gtk-file-picker"]
//!
//! [source]
//! exclude = [{ name = "docs", kind = "dir", scope = "top-level" }]
//!
//! [shell]
//! tools = ["gdb"]
//! ```

mod format;
pub mod parser;

pub use format::{BuildSection, Manifest, PackageSection, ShellSection, SourceSection};
pub use parser::{parse_manifest, parse_manifest_file, validate_manifest};

/// File name of the project manifest
pub const MANIFEST_NAME: &str = "kiln.toml";

/// File name of the manifest's pin file
pub const MANIFEST_LOCK_NAME: &str = "kiln.lock";

/// Lock file used when the manifest does not name one
pub const DEFAULT_LOCK_FILE: &str = "Cargo.lock";
