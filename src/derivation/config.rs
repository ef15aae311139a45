// src/derivation/config.rs

//! Configuration for the Kiln build driver

use std::path::{Path, PathBuf};

/// Where builds land and how they run
#[derive(Debug, Clone)]
pub struct KilnConfig {
    /// Root of the output cache; one directory per plan hash
    pub out_dir: PathBuf,
    /// Root of the package store consulted for dependency prefixes
    pub store_root: PathBuf,
    /// Keep the staged source copy after the build (for debugging)
    pub keep_staging: bool,
    /// Number of parallel jobs handed to the toolchain
    pub jobs: u32,
}

impl Default for KilnConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        let out_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("kiln")
            .join("out");
        let store_root = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("kiln")
            .join("store");

        Self {
            out_dir,
            store_root,
            keep_staging: false,
            jobs,
        }
    }
}

impl KilnConfig {
    /// Configuration writing outputs under `out_dir`
    pub fn with_out_dir(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            ..Self::default()
        }
    }

    /// Use a different package store
    pub fn with_store_root(mut self, store_root: &Path) -> Self {
        self.store_root = store_root.to_path_buf();
        self
    }

    /// Keep staging directories around after the build
    pub fn keep_staging(mut self, keep: bool) -> Self {
        self.keep_staging = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KilnConfig::default();
        assert!(config.out_dir.ends_with("kiln/out"));
        assert!(config.store_root.ends_with("kiln/store"));
        assert!(!config.keep_staging);
        assert!(config.jobs >= 1);
    }

    #[test]
    fn test_config_constructors() {
        let config = KilnConfig::with_out_dir(Path::new("/tmp/kiln-out"))
            .with_store_root(Path::new("/tmp/kiln-store"))
            .keep_staging(true);
        assert_eq!(config.out_dir, PathBuf::from("/tmp/kiln-out"));
        assert_eq!(config.store_root, PathBuf::from("/tmp/kiln-store"));
        assert!(config.keep_staging);
    }
}
