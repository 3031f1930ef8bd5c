// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Loads component manifests and builds the declared file universe together
//! with the reverse ownership index.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{TreeError, TreeResult, MANIFEST_SUFFIX, SHARED_LIB_DIR};

/// The declared file universe plus a reverse index from file to the manifests
/// claiming it.
///
/// Both structures are filled by the same manifest pass and never diverge: a
/// path is declared iff at least one manifest owns it (ignoring the synthetic
/// shared-library seed entry).
pub struct ManifestIndex {
    declared: HashSet<PathBuf>,
    // BTreeMap to ensure alphabetical order of files when serializing and
    // reporting; the owner list keeps manifest load order.
    owners: BTreeMap<PathBuf, Vec<PathBuf>>,
    manifests: usize,
}

impl ManifestIndex {
    /// Create an index containing only the synthetic shared-library entry.
    #[must_use]
    pub fn new() -> Self {
        let mut declared = HashSet::new();
        declared.insert(PathBuf::from(SHARED_LIB_DIR));
        Self {
            declared,
            owners: BTreeMap::new(),
            manifests: 0,
        }
    }

    /// Recursively discover and load every `*.idx` manifest under `dir`.
    ///
    /// Discovery is sorted by file name so that reports are stable across
    /// filesystems; duplicate detection itself is order-independent.
    ///
    /// # Errors
    /// Returns an error if the manifest directory does not exist or a manifest
    /// cannot be read.
    pub fn load_all(&mut self, dir: &Path) -> TreeResult<()> {
        if !dir.is_dir() {
            return Err(TreeError::ManifestDirMissing {
                path: dir.to_path_buf(),
            });
        }
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| TreeError::WalkFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
            if entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(MANIFEST_SUFFIX)
            {
                self.load(entry.path(), dir)?;
            }
        }
        Ok(())
    }

    /// Load one manifest: a newline-delimited list of root-relative file
    /// paths. Whitespace is trimmed and a leading `./` stripped. The manifest
    /// identity is its path relative to the manifest directory.
    ///
    /// # Errors
    /// Returns an error if the manifest cannot be read or lies outside the
    /// manifest directory.
    pub fn load(&mut self, path: &Path, manifest_dir: &Path) -> TreeResult<()> {
        let identity = path
            .strip_prefix(manifest_dir)
            .map_err(|_| TreeError::ManifestOutsideDir {
                path: path.to_path_buf(),
            })?
            .to_path_buf();
        let content = fs::read_to_string(path).map_err(|e| TreeError::ManifestReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let file = PathBuf::from(line.strip_prefix("./").unwrap_or(line));
            self.owners
                .entry(file.clone())
                .or_default()
                .push(identity.clone());
            self.declared.insert(file);
        }
        self.manifests += 1;
        Ok(())
    }

    /// Whether some manifest declares `path` (or it is the synthetic seed).
    #[must_use]
    pub fn declares(&self, path: &Path) -> bool {
        self.declared.contains(path)
    }

    /// The declared file universe, including the synthetic seed entry.
    #[must_use]
    pub fn declared(&self) -> &HashSet<PathBuf> {
        &self.declared
    }

    /// Number of manifests loaded.
    #[must_use]
    pub fn manifest_count(&self) -> usize {
        self.manifests
    }

    /// Every file claimed by more than one manifest, with the owning manifests
    /// in load order. Pure query.
    #[must_use]
    pub fn duplicates(&self) -> BTreeMap<&Path, &[PathBuf]> {
        self.owners
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(file, owners)| (file.as_path(), owners.as_slice()))
            .collect()
    }
}

impl Default for ManifestIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, name: &str, lines: &[&str]) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, lines.join("\n")).unwrap();
    }

    #[test]
    fn test_seed_entry_always_declared() {
        let index = ManifestIndex::new();
        assert!(index.declares(Path::new(SHARED_LIB_DIR)));
        assert_eq!(index.manifest_count(), 0);
    }

    #[test]
    fn test_load_strips_leading_dot_slash_and_whitespace() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            "a.idx",
            &["./bin/tool", "  lib/libfoo.so  ", "", "./share/doc/a"],
        );

        let mut index = ManifestIndex::new();
        index.load_all(dir.path()).unwrap();

        assert!(index.declares(Path::new("bin/tool")));
        assert!(index.declares(Path::new("lib/libfoo.so")));
        assert!(index.declares(Path::new("share/doc/a")));
        assert!(!index.declares(Path::new("./bin/tool")));
        assert_eq!(index.manifest_count(), 1);
    }

    #[test]
    fn test_duplicates_preserve_load_order() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), "a.idx", &["lib/libfoo.so", "bin/a"]);
        write_manifest(dir.path(), "b.idx", &["lib/libfoo.so", "bin/b"]);

        let mut index = ManifestIndex::new();
        index.load_all(dir.path()).unwrap();

        let duplicates = index.duplicates();
        assert_eq!(duplicates.len(), 1);
        let owners = duplicates.get(Path::new("lib/libfoo.so")).unwrap();
        assert_eq!(*owners, &[PathBuf::from("a.idx"), PathBuf::from("b.idx")]);
    }

    #[test]
    fn test_no_duplicates_for_uniquely_owned_files() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), "a.idx", &["bin/a"]);
        write_manifest(dir.path(), "b.idx", &["bin/b"]);

        let mut index = ManifestIndex::new();
        index.load_all(dir.path()).unwrap();
        assert!(index.duplicates().is_empty());
    }

    #[test]
    fn test_load_all_discovers_nested_manifests() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), "top.idx", &["bin/top"]);
        write_manifest(dir.path(), "sub/inner.idx", &["bin/inner"]);
        write_manifest(dir.path(), "notes.txt", &["bin/ignored"]);

        let mut index = ManifestIndex::new();
        index.load_all(dir.path()).unwrap();

        assert_eq!(index.manifest_count(), 2);
        assert!(index.declares(Path::new("bin/top")));
        assert!(index.declares(Path::new("bin/inner")));
        assert!(!index.declares(Path::new("bin/ignored")));
    }

    #[test]
    fn test_manifest_identity_is_relative_to_manifest_dir() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), "sub/inner.idx", &["shared/file"]);
        write_manifest(dir.path(), "outer.idx", &["shared/file"]);

        let mut index = ManifestIndex::new();
        index.load_all(dir.path()).unwrap();

        let duplicates = index.duplicates();
        let owners = duplicates.get(Path::new("shared/file")).unwrap();
        assert!(owners.contains(&PathBuf::from("outer.idx")));
        assert!(owners.contains(&PathBuf::from("sub/inner.idx")));
    }

    #[test]
    fn test_missing_manifest_dir_is_fatal() {
        let mut index = ManifestIndex::new();
        let result = index.load_all(Path::new("/nonexistent/manifests"));
        assert!(matches!(result, Err(TreeError::ManifestDirMissing { .. })));
    }
}
