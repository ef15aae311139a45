// src/lib.rs

//! Kiln: declarative build composition
//!
//! Kiln turns a source tree plus a small manifest into a reproducible,
//! platform-aware build plan for a native GUI application, and provisions
//! a development shell from the same inputs.
//!
//! # Architecture
//!
//! - Version: a date-stamped pre-release version from the source timestamp
//! - Source: the filtered, fingerprinted build input tree
//! - Catalog: tagged table of native dependencies per platform and feature
//! - Derivation: the immutable build plan, built through a cached toolchain
//! - Environment: run-time variables the binary needs to find its libraries
//! - Shell: the dev environment layered on the production dependency set

pub mod catalog;
pub mod derivation;
pub mod environment;
mod error;
pub mod hash;
pub mod manifest;
pub mod platform;
pub mod shell;
pub mod source;
pub mod version;

pub use catalog::{Catalog, Dependency, DependencyKind, DependencySet, resolve_dependencies};
pub use derivation::{
    BuildOutcome, CargoToolchain, CheckPhase, Composition, Derivation, Kiln, KilnConfig, Meta,
    Toolchain, compose,
};
pub use environment::{EnvMap, PackageLocator, StoreLocator, compose_environment};
pub use error::{Error, Result};
pub use hash::{Hash, HashAlgorithm, Hasher};
pub use manifest::{Manifest, parse_manifest, parse_manifest_file};
pub use platform::{Feature, FeatureSet, Platform};
pub use shell::{DevEnvironment, ShellHook, provision};
pub use source::{ExcludeRule, ExcludeRules, SourceTree, filter_source};
pub use version::{VersionInfo, derive_version};
