// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Collect phase of the dependency and ABI analysis: scans every analyzable
//! binary in the tree independently. Cross-binary checks (library
//! reachability, ABI baseline) happen only after all scans are merged.

use goblin::elf::dynamic::{DT_NEEDED, DT_RUNPATH};
use path_clean::PathClean;
use rayon::prelude::*;
use regex::bytes::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::image::{ElfError, ElfImage};
use super::SkipReason;
use crate::tree::Root;
use crate::ValidatorConfig;

/// Fixed marker substring distinguishing ABI-stub import binaries from
/// runtime binaries. Stubs contribute to the allow-listed ABI baseline and
/// are never counted as library providers.
const LINK_ONLY_MARKER: &str = "link-only";

// Symbol-version tokens like `GLIBC_2.17`, up to their string-table null
// terminator.
static VERSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GLIBC_[0-9.]+\x00").expect("hard-coded regex"));

/// Everything extracted from one analyzable binary during the collect phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BinaryScan {
    /// The installed path contains the link-only marker.
    pub(crate) link_only: bool,
    /// `DT_NEEDED` names in table order, duplicates preserved.
    pub(crate) needed: Vec<String>,
    /// Resolved `DT_RUNPATH` directories, root-relative, deduplicated.
    pub(crate) runpaths: BTreeSet<PathBuf>,
    /// `DT_RUNPATH` entries that do not resolve to an existing directory or
    /// symlink inside the root.
    pub(crate) invalid_runpaths: BTreeSet<String>,
    /// Distinct ABI version tokens found in the dynamic string table.
    pub(crate) versions: BTreeSet<String>,
}

/// Per-binary result of the collect phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BinaryOutcome {
    Scanned(BinaryScan),
    Skipped(SkipReason),
}

/// Outcomes keyed by root-relative binary path.
pub(crate) type BinaryOutcomes = BTreeMap<PathBuf, BinaryOutcome>;

pub(crate) struct Analyzer<'a> {
    root: &'a Root,
    config: &'a ValidatorConfig,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn new(root: &'a Root, config: &'a ValidatorConfig) -> Self {
        Self { root, config }
    }

    /// Scan every analyzable binary in the installed tree. Each file is
    /// independent, so the scan runs in parallel; callers must merge the
    /// outcomes before evaluating any cross-binary property.
    pub(crate) fn scan_all(&self) -> BinaryOutcomes {
        self.root
            .installed()
            .par_iter()
            .filter_map(|path| self.scan_one(path).map(|outcome| (path.clone(), outcome)))
            .collect()
    }

    fn scan_one(&self, path: &Path) -> Option<BinaryOutcome> {
        let absolute = self.root.path().join(path);
        if !Self::analyzable(&absolute) {
            return None;
        }
        Some(match self.scan_elf(path, &absolute) {
            Ok(scan) => BinaryOutcome::Scanned(scan),
            Err(reason) => BinaryOutcome::Skipped(reason),
        })
    }

    /// Analyzable binary: a regular file with at least one execute bit set,
    /// starting with the ELF magic.
    fn analyzable(absolute: &Path) -> bool {
        let Ok(metadata) = absolute.symlink_metadata() else {
            return false;
        };
        metadata.is_file()
            && metadata.permissions().mode() & 0o111 != 0
            && ElfImage::is_elf(absolute)
    }

    fn scan_elf(&self, path: &Path, absolute: &Path) -> Result<BinaryScan, SkipReason> {
        let image = ElfImage::from_path(absolute).map_err(|e| match e {
            ElfError::OpenFailed { .. } | ElfError::ReadFailed { .. } => {
                eprintln!("Failed to read binary: binary={}: {e}", path.display());
                SkipReason::Unreadable {
                    detail: e.to_string(),
                }
            }
            other => SkipReason::Structural {
                detail: other.to_string(),
            },
        })?;

        if image.machine() != self.config.machine {
            return Err(SkipReason::ForeignMachine {
                machine: image.machine(),
            });
        }
        match image.dynamic_segment_count() {
            1 => {}
            0 => return Err(SkipReason::Static),
            _ => return Err(SkipReason::MultipleDynamicSegments),
        }

        let table = image.string_table().map_err(|e| SkipReason::Structural {
            detail: e.to_string(),
        })?;

        let mut needed = Vec::new();
        let mut runpath_raw = None;
        for (tag, value) in image.dynamic_tags() {
            match *tag {
                DT_NEEDED => {
                    if let Some(name) = ElfImage::string_at(table, *value) {
                        needed.push(name.to_string());
                    }
                }
                DT_RUNPATH => {
                    runpath_raw = ElfImage::string_at(table, *value).map(str::to_string);
                }
                _ => {}
            }
        }
        let (runpaths, invalid_runpaths) = self.resolve_runpaths(path, runpath_raw.as_deref());

        Ok(BinaryScan {
            link_only: path.to_string_lossy().contains(LINK_ONLY_MARKER),
            needed,
            runpaths,
            invalid_runpaths,
            versions: scan_version_tokens(table),
        })
    }

    /// Expand `$ORIGIN`, canonicalize every `RUNPATH` entry and express it
    /// relative to the root, deduplicated. Canonicalization resolves
    /// directory symlinks, so an entry reaching a library directory through
    /// a symlink compares in the same form the declared universe uses.
    /// Entries that do not name an existing directory inside the root are
    /// returned separately as invalid; entries escaping the root are invalid
    /// by construction.
    fn resolve_runpaths(
        &self,
        path: &Path,
        raw: Option<&str>,
    ) -> (BTreeSet<PathBuf>, BTreeSet<String>) {
        let mut resolved = BTreeSet::new();
        let mut invalid = BTreeSet::new();
        let Some(raw) = raw else {
            return (resolved, invalid);
        };

        let origin = self
            .root
            .path()
            .join(path.parent().unwrap_or_else(|| Path::new("")));
        for entry in raw.split(':').filter(|entry| !entry.is_empty()) {
            let expanded = if entry.contains("$ORIGIN") {
                entry.replace("$ORIGIN", &origin.to_string_lossy())
            } else {
                entry.to_string()
            };
            // A relative entry is resolved against the process working
            // directory at load time, which no search inside the root can
            // satisfy.
            if !Path::new(&expanded).is_absolute() {
                invalid.insert(entry.to_string());
                continue;
            }
            let cleaned = PathBuf::from(expanded).clean();
            // Nonexistent targets (including dangling symlinks) cannot be
            // canonicalized and are invalid.
            let Ok(canonical) = cleaned.canonicalize() else {
                let key = match cleaned.strip_prefix(self.root.path()) {
                    Ok(relative) => relative.to_string_lossy().into_owned(),
                    Err(_) => cleaned.to_string_lossy().into_owned(),
                };
                invalid.insert(key);
                continue;
            };
            match canonical.strip_prefix(self.root.path()) {
                Ok(relative) if canonical.is_dir() => {
                    resolved.insert(relative.to_path_buf());
                }
                Ok(relative) => {
                    invalid.insert(relative.to_string_lossy().into_owned());
                }
                Err(_) => {
                    invalid.insert(cleaned.to_string_lossy().into_owned());
                }
            }
        }
        (resolved, invalid)
    }
}

/// Distinct ABI version tokens in a raw string table buffer.
fn scan_version_tokens(table: &[u8]) -> BTreeSet<String> {
    VERSION_TOKEN
        .find_iter(table)
        .filter_map(|token| {
            let bytes = token.as_bytes();
            // Strip the trailing null terminator.
            std::str::from_utf8(&bytes[..bytes.len() - 1])
                .ok()
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ManifestIndex;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_scan_version_tokens() {
        let table = b"\0libc.so.6\0GLIBC_2.17\0GLIBC_2.34\0GLIBC_2.17\0not_a_token\0";
        let tokens = scan_version_tokens(table);
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("GLIBC_2.17"));
        assert!(tokens.contains("GLIBC_2.34"));
    }

    #[test]
    fn test_scan_version_tokens_requires_null_termination() {
        // The trailing token has no terminator and must be ignored.
        let tokens = scan_version_tokens(b"GLIBC_2.2.5\0GLIBC_2.40");
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("GLIBC_2.2.5"));
    }

    fn root_with_dirs(dirs: &[&str]) -> (TempDir, Root) {
        let tmp = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        let root = Root::new_for_testing(
            tmp.path().canonicalize().unwrap(),
            ManifestIndex::new(),
            BTreeSet::new(),
        );
        (tmp, root)
    }

    #[test]
    fn test_resolve_runpaths_origin_substitution() {
        let (_tmp, root) = root_with_dirs(&["bin", "lib"]);
        let config = ValidatorConfig::default();
        let analyzer = Analyzer::new(&root, &config);

        let (resolved, invalid) =
            analyzer.resolve_runpaths(Path::new("bin/tool"), Some("$ORIGIN/../lib"));
        assert!(invalid.is_empty());
        assert_eq!(resolved, BTreeSet::from([PathBuf::from("lib")]));
    }

    #[test]
    fn test_resolve_runpaths_bare_origin_is_own_directory() {
        let (_tmp, root) = root_with_dirs(&["bin"]);
        let config = ValidatorConfig::default();
        let analyzer = Analyzer::new(&root, &config);

        let (resolved, invalid) = analyzer.resolve_runpaths(Path::new("bin/tool"), Some("$ORIGIN"));
        assert!(invalid.is_empty());
        assert_eq!(resolved, BTreeSet::from([PathBuf::from("bin")]));
    }

    #[test]
    fn test_resolve_runpaths_deduplicates() {
        let (_tmp, root) = root_with_dirs(&["bin", "lib"]);
        let config = ValidatorConfig::default();
        let analyzer = Analyzer::new(&root, &config);

        let (resolved, _) = analyzer.resolve_runpaths(
            Path::new("bin/tool"),
            Some("$ORIGIN/../lib:$ORIGIN/../lib:$ORIGIN/./../lib"),
        );
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_resolve_runpaths_follow_directory_symlinks() {
        let (tmp, root) = root_with_dirs(&["bin", "lib"]);
        symlink(tmp.path().join("lib"), tmp.path().join("lib64")).unwrap();
        let config = ValidatorConfig::default();
        let analyzer = Analyzer::new(&root, &config);

        let (resolved, invalid) =
            analyzer.resolve_runpaths(Path::new("bin/tool"), Some("$ORIGIN/../lib64"));
        assert!(invalid.is_empty());
        // The symlinked entry resolves to the canonical directory.
        assert_eq!(resolved, BTreeSet::from([PathBuf::from("lib")]));
    }

    #[test]
    fn test_resolve_runpaths_dangling_symlink_is_invalid() {
        let (tmp, root) = root_with_dirs(&["bin"]);
        symlink(tmp.path().join("nowhere"), tmp.path().join("lib64")).unwrap();
        let config = ValidatorConfig::default();
        let analyzer = Analyzer::new(&root, &config);

        let (resolved, invalid) =
            analyzer.resolve_runpaths(Path::new("bin/tool"), Some("$ORIGIN/../lib64"));
        assert!(resolved.is_empty());
        assert_eq!(invalid, BTreeSet::from(["lib64".to_string()]));
    }

    #[test]
    fn test_resolve_runpaths_missing_directory_is_invalid() {
        let (_tmp, root) = root_with_dirs(&["bin"]);
        let config = ValidatorConfig::default();
        let analyzer = Analyzer::new(&root, &config);

        let (resolved, invalid) =
            analyzer.resolve_runpaths(Path::new("bin/tool"), Some("$ORIGIN/../lib"));
        assert!(resolved.is_empty());
        assert_eq!(invalid, BTreeSet::from(["lib".to_string()]));
    }

    #[test]
    fn test_resolve_runpaths_outside_root_is_invalid() {
        let (_tmp, root) = root_with_dirs(&["bin"]);
        let config = ValidatorConfig::default();
        let analyzer = Analyzer::new(&root, &config);

        let (resolved, invalid) =
            analyzer.resolve_runpaths(Path::new("bin/tool"), Some("/usr/lib:relative/lib"));
        assert!(resolved.is_empty());
        assert_eq!(invalid.len(), 2);
        assert!(invalid.contains("/usr/lib"));
        assert!(invalid.contains("relative/lib"));
    }

    #[test]
    fn test_analyzable_requires_exec_bit_and_magic() {
        let tmp = TempDir::new().unwrap();
        let elf_like = tmp.path().join("elf-like");
        fs::write(&elf_like, b"\x7fELF-rest-does-not-matter").unwrap();

        // No execute bit yet.
        assert!(!Analyzer::analyzable(&elf_like));

        let mut perms = fs::metadata(&elf_like).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&elf_like, perms).unwrap();
        assert!(Analyzer::analyzable(&elf_like));

        let script = tmp.path().join("script");
        fs::write(&script, b"#!/bin/sh\n").unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();
        assert!(!Analyzer::analyzable(&script));
    }
}
