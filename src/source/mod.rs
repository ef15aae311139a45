// src/source/mod.rs

//! Source filtering and fingerprinting
//!
//! Produces the exact set of files handed to the compiler. Two kinds of
//! entries are dropped by default:
//! - build output (`target/` anywhere, the top-level `result` link)
//! - the top-level build descriptor files (`kiln.toml`, `kiln.lock`), so that
//!   editing the build recipe alone does not change the source fingerprint
//!
//! Traversal is sorted by file name, so an unchanged tree always yields the
//! same entry order and the same fingerprint.

use crate::error::{Error, Result};
use crate::hash::{Hash, HashAlgorithm, Hasher, update_from_reader};
use crate::manifest::{MANIFEST_LOCK_NAME, MANIFEST_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Directory the language toolchain writes build output to
pub const BUILD_OUTPUT_DIR: &str = "target";

/// Link left behind by a previous `kiln build`
pub const RESULT_LINK: &str = "result";

/// Kind of a filesystem entry, or `Any` in a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    #[serde(alias = "dir")]
    Directory,
    Symlink,
    Any,
}

impl EntryKind {
    fn of(entry: &DirEntry) -> Self {
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }

    fn tag(&self) -> &'static [u8] {
        match self {
            Self::File => b"file",
            Self::Directory => b"dir",
            Self::Symlink => b"link",
            Self::Any => b"any",
        }
    }
}

/// Where in the tree a rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleScope {
    #[default]
    Anywhere,
    /// Only direct children of the source root
    TopLevel,
}

/// Exclude entries whose basename and kind match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExcludeRule {
    pub name: String,
    #[serde(default = "default_rule_kind")]
    pub kind: EntryKind,
    #[serde(default)]
    pub scope: RuleScope,
}

fn default_rule_kind() -> EntryKind {
    EntryKind::Any
}

impl ExcludeRule {
    pub fn new(name: impl Into<String>, kind: EntryKind, scope: RuleScope) -> Self {
        Self {
            name: name.into(),
            kind,
            scope,
        }
    }

    /// `depth` is 1 for direct children of the root
    pub fn matches(&self, basename: &str, kind: EntryKind, depth: usize) -> bool {
        basename == self.name
            && (self.kind == EntryKind::Any || self.kind == kind)
            && (self.scope == RuleScope::Anywhere || depth == 1)
    }
}

/// Ordered rule list; an entry is excluded if any rule matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludeRules(Vec<ExcludeRule>);

impl Default for ExcludeRules {
    fn default() -> Self {
        Self(vec![
            ExcludeRule::new(BUILD_OUTPUT_DIR, EntryKind::Any, RuleScope::Anywhere),
            ExcludeRule::new(RESULT_LINK, EntryKind::Any, RuleScope::TopLevel),
            ExcludeRule::new(MANIFEST_NAME, EntryKind::File, RuleScope::TopLevel),
            ExcludeRule::new(MANIFEST_LOCK_NAME, EntryKind::File, RuleScope::TopLevel),
        ])
    }
}

impl ExcludeRules {
    /// No rules at all
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Default rules followed by `extra`
    pub fn with_extra(extra: impl IntoIterator<Item = ExcludeRule>) -> Self {
        let mut rules = Self::default();
        rules.0.extend(extra);
        rules
    }

    pub fn push(&mut self, rule: ExcludeRule) {
        self.0.push(rule);
    }

    pub fn rules(&self) -> &[ExcludeRule] {
        &self.0
    }

    pub fn excludes(&self, basename: &str, kind: EntryKind, depth: usize) -> bool {
        self.0.iter().any(|r| r.matches(basename, kind, depth))
    }
}

/// A kept entry, relative to the source root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
}

/// The filtered source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceTree {
    root: PathBuf,
    entries: Vec<SourceEntry>,
    fingerprint: Hash,
    last_modified: Option<DateTime<Utc>>,
}

impl SourceTree {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    /// Content fingerprint over paths, kinds and file contents
    pub fn fingerprint(&self) -> &Hash {
        &self.fingerprint
    }

    /// Newest modification time among kept entries
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind != EntryKind::Directory)
            .count()
    }

    /// True when no files (only directories, or nothing) survived filtering
    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    pub fn contains(&self, relative: impl AsRef<Path>) -> bool {
        let relative = relative.as_ref();
        self.entries.iter().any(|e| e.path == relative)
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Walk `root`, keep what `rules` allow and fingerprint the result
pub fn filter_source(root: &Path, rules: &ExcludeRules) -> Result<SourceTree> {
    if !root.is_dir() {
        return Err(Error::NotFound(format!(
            "Source root is not a directory: {}",
            root.display()
        )));
    }

    let mut hasher = Hasher::new(HashAlgorithm::Xxh128);
    let mut entries = Vec::new();
    let mut last_modified: Option<DateTime<Utc>> = None;
    let mut excluded = 0usize;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let basename = entry.file_name().to_string_lossy();
            let keep = !rules.excludes(&basename, EntryKind::of(entry), entry.depth());
            if !keep {
                debug!("Excluding {}", entry.path().display());
                excluded += 1;
            }
            keep
        });

    for entry in walker {
        let entry = entry?;
        let kind = EntryKind::of(&entry);
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::IoError(format!("{}: {}", entry.path().display(), e)))?
            .to_path_buf();

        // Directory mtimes move whenever excluded output appears inside them
        if matches!(kind, EntryKind::File | EntryKind::Symlink)
            && let Ok(modified) = entry.path().symlink_metadata()?.modified()
        {
            let modified = DateTime::<Utc>::from(modified);
            last_modified = Some(last_modified.map_or(modified, |m| m.max(modified)));
        }

        hasher.update_field(portable_path(&relative).as_bytes());
        hasher.update_field(kind.tag());

        let size = match kind {
            EntryKind::File => {
                let mut file = File::open(entry.path())?;
                let size = update_from_reader(&mut hasher, &mut file)?;
                hasher.update(&size.to_le_bytes());
                size
            }
            EntryKind::Symlink => {
                let target = fs::read_link(entry.path())?;
                hasher.update_field(portable_path(&target).as_bytes());
                0
            }
            EntryKind::Directory | EntryKind::Any => 0,
        };

        entries.push(SourceEntry {
            path: relative,
            kind,
            size,
        });
    }

    let tree = SourceTree {
        root: root.to_path_buf(),
        entries,
        fingerprint: hasher.finalize(),
        last_modified,
    };

    info!(
        "Filtered source {}: {} files kept, {} entries excluded (fingerprint {})",
        root.display(),
        tree.file_count(),
        excluded,
        tree.fingerprint.short(16)
    );

    Ok(tree)
}

/// Forward-slash path rendering so fingerprints agree across hosts
fn portable_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
