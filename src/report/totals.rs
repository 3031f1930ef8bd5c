// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Statistics over the universes, the binary scan, and the findings.

use dashmap::DashSet;
use rayon::prelude::*;
use serde::Serialize;
use std::ops::Add;

use super::Findings;
use crate::elf::{BinaryOutcome, BinaryOutcomes};
use crate::tree::Root;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ReportTotals {
    pub(crate) manifests: usize,
    pub(crate) declared_files: usize,
    pub(crate) installed_files: usize,
    pub(crate) binaries: BinaryTotals,
    pub(crate) dependencies: DependencyTotals,
    pub(crate) findings: FindingTotals,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct BinaryTotals {
    pub(crate) analyzed: usize,
    pub(crate) link_only: usize,
    pub(crate) skipped: usize,
    pub(crate) total: usize,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct DependencyTotals {
    pub(crate) total: usize,
    pub(crate) total_unique: usize,
    pub(crate) unresolved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FindingTotals {
    pub(crate) duplicates: usize,
    pub(crate) missing: usize,
    pub(crate) orphans: usize,
    pub(crate) invalid_runpaths: usize,
    pub(crate) unreachable_libraries: usize,
    pub(crate) external_dependencies: usize,
    pub(crate) disallowed_versions: usize,
}

impl ReportTotals {
    #[must_use]
    pub(crate) fn new(root: &Root, outcomes: &BinaryOutcomes, findings: &Findings) -> Self {
        let (binaries, dependencies) = Self::calculate_scan_totals(outcomes, findings);
        Self {
            manifests: root.index().manifest_count(),
            declared_files: root.index().declared().len(),
            installed_files: root.installed().len(),
            binaries,
            dependencies,
            findings: FindingTotals {
                duplicates: findings.duplicates.len(),
                missing: findings.missing.len(),
                orphans: findings.orphans.len(),
                invalid_runpaths: findings.invalid_runpaths.len(),
                unreachable_libraries: findings.unreachable_libraries.len(),
                external_dependencies: findings.external_dependencies.len(),
                disallowed_versions: findings.disallowed_versions.len(),
            },
        }
    }

    fn calculate_scan_totals(
        outcomes: &BinaryOutcomes,
        findings: &Findings,
    ) -> (BinaryTotals, DependencyTotals) {
        let unique = DashSet::new();
        let (mut binaries, mut dependencies) = outcomes
            .par_iter()
            .fold(
                || (BinaryTotals::default(), DependencyTotals::default()),
                |(mut binaries, mut dependencies), (_, outcome)| {
                    match outcome {
                        BinaryOutcome::Scanned(scan) => {
                            binaries.analyzed += 1;
                            if scan.link_only {
                                binaries.link_only += 1;
                            }
                            dependencies.total += scan.needed.len();
                            for library in &scan.needed {
                                unique.insert(library.as_str());
                            }
                        }
                        BinaryOutcome::Skipped(_) => binaries.skipped += 1,
                    }
                    (binaries, dependencies)
                },
            )
            .reduce(
                || (BinaryTotals::default(), DependencyTotals::default()),
                |(a_bin, a_dep), (b_bin, b_dep)| (a_bin + b_bin, a_dep + b_dep),
            );
        binaries.total = binaries.analyzed + binaries.skipped;
        dependencies.total_unique = unique.len();
        dependencies.unresolved = findings
            .unreachable_libraries
            .values()
            .map(|unreachable| unreachable.consumers.len())
            .sum::<usize>()
            + findings
                .external_dependencies
                .values()
                .map(|consumers| consumers.len())
                .sum::<usize>();
        (binaries, dependencies)
    }
}

impl Add for BinaryTotals {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            analyzed: self.analyzed + other.analyzed,
            link_only: self.link_only + other.link_only,
            skipped: self.skipped + other.skipped,
            total: 0, // Handled by the calculate function.
        }
    }
}

impl Add for DependencyTotals {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            total_unique: 0, // Handled by the calculate function.
            unresolved: 0,   // Handled by the calculate function.
        }
    }
}
