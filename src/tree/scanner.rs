// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Walks the installed root and records its files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively collect every regular file and symlink under `root`, as paths
/// relative to `root`. Symbolic links are recorded as themselves and never
/// followed, so a symlinked directory shows up as a single entry.
///
/// Unreadable entries are logged and skipped; they never abort the walk.
pub(crate) fn scan(root: &Path) -> BTreeSet<PathBuf> {
    let mut installed = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("Skipping unreadable entry during scan: {e}");
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_file() || file_type.is_symlink() {
            if let Ok(relative) = entry.path().strip_prefix(root) {
                installed.insert(relative.to_path_buf());
            }
        }
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_scan_records_relative_file_paths() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("bin")).unwrap();
        fs::create_dir_all(root.path().join("lib/sub")).unwrap();
        fs::write(root.path().join("bin/tool"), b"x").unwrap();
        fs::write(root.path().join("lib/sub/libfoo.so"), b"x").unwrap();

        let installed = scan(root.path());
        assert_eq!(installed.len(), 2);
        assert!(installed.contains(Path::new("bin/tool")));
        assert!(installed.contains(Path::new("lib/sub/libfoo.so")));
    }

    #[test]
    fn test_scan_does_not_record_directories() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("empty/dir")).unwrap();

        let installed = scan(root.path());
        assert!(installed.is_empty());
    }

    #[test]
    fn test_scan_records_directory_symlink_without_descending() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("real")).unwrap();
        fs::write(root.path().join("real/file"), b"x").unwrap();
        symlink(root.path().join("real"), root.path().join("alias")).unwrap();

        let installed = scan(root.path());
        assert!(installed.contains(Path::new("alias")));
        assert!(installed.contains(Path::new("real/file")));
        // The symlinked directory is not traversed.
        assert!(!installed.contains(Path::new("alias/file")));
    }

    #[test]
    fn test_scan_records_file_symlinks() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("target"), b"x").unwrap();
        symlink(root.path().join("target"), root.path().join("link")).unwrap();

        let installed = scan(root.path());
        assert!(installed.contains(Path::new("target")));
        assert!(installed.contains(Path::new("link")));
    }
}
