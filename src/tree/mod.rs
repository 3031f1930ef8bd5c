// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The two universes of an installed root: the files its manifests declare and
//! the files actually present on disk.

mod manifest;
mod scanner;

pub use manifest::ManifestIndex;

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filename suffix identifying a component manifest.
pub const MANIFEST_SUFFIX: &str = ".idx";

/// Shared library directory. Always part of the declared universe and exempt
/// from presence checks.
pub const SHARED_LIB_DIR: &str = "lib64";

/// Result type for tree operations.
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Errors that can occur while loading a root.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Root directory not found: {path:?}")]
    RootMissing { path: PathBuf },
    #[error("Failed to resolve root directory: {path:?}")]
    RootUnresolvable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Manifest directory not found: {path:?}")]
    ManifestDirMissing { path: PathBuf },
    #[error("Failed to read manifest: {path:?}")]
    ManifestReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Manifest is not inside the manifest directory: {path:?}")]
    ManifestOutsideDir { path: PathBuf },
    #[error("Failed to walk directory: {path:?}")]
    WalkFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// The installation tree under audit.
///
/// Both universes are built once at load time and read-only afterwards.
pub struct Root {
    path: PathBuf,
    index: ManifestIndex,
    installed: BTreeSet<PathBuf>,
}

impl Root {
    /// Load a root: parse every manifest under `manifest_dir` (relative to the
    /// root) and scan the installed tree.
    ///
    /// # Errors
    /// Returns an error if the root or the manifest directory does not exist.
    /// Unreadable entries inside the tree are logged and skipped instead.
    pub fn load(path: PathBuf, manifest_dir: &Path) -> TreeResult<Self> {
        if !path.is_dir() {
            return Err(TreeError::RootMissing { path });
        }
        // RUNPATH entries are compared against the root prefix, so the root
        // itself must be in canonical absolute form.
        let path = path
            .canonicalize()
            .map_err(|e| TreeError::RootUnresolvable {
                path: path.clone(),
                source: e,
            })?;

        let mut index = ManifestIndex::new();
        index.load_all(&path.join(manifest_dir))?;
        let installed = scanner::scan(&path);
        Ok(Self {
            path,
            index,
            installed,
        })
    }

    /// Absolute, canonical path of the root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The declared file universe and ownership index.
    #[must_use]
    pub fn index(&self) -> &ManifestIndex {
        &self.index
    }

    /// Root-relative paths of every installed file and symlink.
    #[must_use]
    pub fn installed(&self) -> &BTreeSet<PathBuf> {
        &self.installed
    }

    #[cfg(test)]
    /// Create a root with prebuilt universes. Only available in test builds.
    pub(crate) fn new_for_testing(
        path: PathBuf,
        index: ManifestIndex,
        installed: BTreeSet<PathBuf>,
    ) -> Self {
        Self {
            path,
            index,
            installed,
        }
    }
}
