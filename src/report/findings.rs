// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The finding sets and the two-phase consistency check. Cross-binary
//! properties (ABI baseline, library reachability) are evaluated strictly
//! after the collect results of all binaries are merged.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::elf::{BinaryOutcome, BinaryOutcomes};
use crate::tree::{Root, SHARED_LIB_DIR};

/// A shared library that exists somewhere in the root but is not reachable
/// through the consumer's `RUNPATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreachableLibrary {
    /// Binaries in the root providing this library name.
    pub providers: Vec<PathBuf>,
    /// Binaries that need the library but cannot reach any provider.
    pub consumers: BTreeSet<PathBuf>,
}

/// All consistency findings of one run. BTree containers keep report output
/// stable.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Findings {
    /// File claimed by more than one manifest, with owners in load order.
    pub duplicates: BTreeMap<PathBuf, Vec<PathBuf>>,
    /// Declared by a manifest but absent from the installed tree.
    pub missing: BTreeSet<PathBuf>,
    /// Installed but not declared by any manifest.
    pub orphans: BTreeSet<PathBuf>,
    /// `RUNPATH` entry that does not resolve inside the root, with the
    /// binaries carrying it.
    pub invalid_runpaths: BTreeMap<String, BTreeSet<PathBuf>>,
    /// Library present in the root but unreachable via the consumer's
    /// `RUNPATH`.
    pub unreachable_libraries: BTreeMap<String, UnreachableLibrary>,
    /// Dependencies with no provider in the root, assumed satisfied by the
    /// host system. Never part of the verdict.
    pub external_dependencies: BTreeMap<String, BTreeSet<PathBuf>>,
    /// ABI version token used beyond the link-only baseline, with the
    /// binaries using it.
    pub disallowed_versions: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl Findings {
    /// Aggregate all findings for a root from the merged per-binary outcomes.
    pub(crate) fn aggregate(root: &Root, outcomes: &BinaryOutcomes) -> Self {
        let mut findings = Self::default();
        findings.collect_ownership(root);
        findings.collect_binary_findings(root, outcomes);
        findings
    }

    /// The overall verdict: consistent iff no finding set that counts toward
    /// the verdict is non-empty. External dependencies are exempt.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.duplicates.is_empty()
            && self.missing.is_empty()
            && self.orphans.is_empty()
            && self.invalid_runpaths.is_empty()
            && self.unreachable_libraries.is_empty()
            && self.disallowed_versions.is_empty()
    }

    /// Drop the collected external dependencies from the report output.
    pub(crate) fn suppress_external_dependencies(&mut self) {
        self.external_dependencies.clear();
    }

    /// Diff the declared and installed universes and collect duplicate
    /// ownership.
    fn collect_ownership(&mut self, root: &Root) {
        for (file, owners) in root.index().duplicates() {
            self.duplicates.insert(file.to_path_buf(), owners.to_vec());
        }
        for file in root.index().declared() {
            // The synthetic shared-library seed is exempt from presence checks.
            if file.as_path() == Path::new(SHARED_LIB_DIR) {
                continue;
            }
            if !root.installed().contains(file) {
                self.missing.insert(file.clone());
            }
        }
        for file in root.installed() {
            if !root.index().declares(file) {
                self.orphans.insert(file.clone());
            }
        }
    }

    fn collect_binary_findings(&mut self, root: &Root, outcomes: &BinaryOutcomes) {
        // Merge step: the ABI baseline and the provider map must be complete
        // over ALL binaries before any per-binary check runs.
        let mut baseline: BTreeSet<&str> = BTreeSet::new();
        let mut providers: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
        for (path, outcome) in outcomes {
            let BinaryOutcome::Scanned(scan) = outcome else {
                continue;
            };
            if scan.link_only {
                baseline.extend(scan.versions.iter().map(String::as_str));
            } else if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                providers.entry(name).or_default().push(path.as_path());
            }
            for entry in &scan.invalid_runpaths {
                self.invalid_runpaths
                    .entry(entry.clone())
                    .or_default()
                    .insert(path.clone());
            }
        }

        // Check phase.
        for (path, outcome) in outcomes {
            let BinaryOutcome::Scanned(scan) = outcome else {
                continue;
            };
            for library in &scan.needed {
                // Resolution is a membership test against the declared
                // universe, not the installed tree: a declared-but-deleted
                // candidate still resolves and is reported through the
                // independent "missing" finding.
                let found = scan
                    .runpaths
                    .iter()
                    .any(|runpath| root.index().declares(&runpath.join(library)));
                if found {
                    continue;
                }
                if let Some(provider_paths) = providers.get(library.as_str()) {
                    self.unreachable_libraries
                        .entry(library.clone())
                        .or_insert_with(|| UnreachableLibrary {
                            providers: provider_paths
                                .iter()
                                .map(|provider| provider.to_path_buf())
                                .collect(),
                            consumers: BTreeSet::new(),
                        })
                        .consumers
                        .insert(path.clone());
                } else {
                    self.external_dependencies
                        .entry(library.clone())
                        .or_default()
                        .insert(path.clone());
                }
            }
            if !scan.link_only {
                for version in &scan.versions {
                    if !baseline.contains(version.as_str()) {
                        self.disallowed_versions
                            .entry(version.clone())
                            .or_default()
                            .insert(path.clone());
                    }
                }
            }
        }
    }
}
