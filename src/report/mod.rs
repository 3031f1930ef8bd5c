// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Report struct and public API for generating verification results.

mod console;
mod findings;
mod totals;
mod validate;

pub use console::summarize_report;
pub use findings::{Findings, UnreachableLibrary};
pub use validate::validate_report;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::elf::{Analyzer, BinaryOutcome, SkipReason};
use crate::tree::Root;
use crate::ValidatorConfig;
use totals::ReportTotals;

/// The structured result of one verification run.
#[derive(Debug, Serialize)]
pub struct Report {
    root: String,
    totals: ReportTotals,
    findings: Findings,
    // Binaries excluded from analysis, with the reason. Observable but never
    // part of the verdict.
    skipped: BTreeMap<PathBuf, SkipReason>,
}

impl Report {
    /// Run the full analysis pipeline over a loaded root and aggregate the
    /// findings: parallel per-binary collect, barrier merge, cross-binary
    /// checks, universe diff.
    #[must_use]
    pub fn new(root: &Root, config: &ValidatorConfig) -> Self {
        let outcomes = Analyzer::new(root, config).scan_all();
        let mut findings = Findings::aggregate(root, &outcomes);
        // Totals are computed before any suppression: the unresolved and
        // external counters always reflect what was collected, even when the
        // external detail map is not emitted.
        let totals = ReportTotals::new(root, &outcomes, &findings);
        if !config.report_external_dependencies {
            findings.suppress_external_dependencies();
        }
        let skipped = outcomes
            .iter()
            .filter_map(|(path, outcome)| match outcome {
                BinaryOutcome::Skipped(reason) => Some((path.clone(), reason.clone())),
                BinaryOutcome::Scanned(_) => None,
            })
            .collect();

        Self {
            root: root.path().display().to_string(),
            totals,
            findings,
            skipped,
        }
    }

    /// The aggregated findings, carrying the verdict.
    #[must_use]
    pub fn findings(&self) -> &Findings {
        &self.findings
    }

    /// Binaries excluded from analysis and why.
    #[must_use]
    pub fn skipped(&self) -> &BTreeMap<PathBuf, SkipReason> {
        &self.skipped
    }
}
