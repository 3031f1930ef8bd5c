// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! A tool for auditing installed distribution roots for internal consistency.
//!
//! This crate provides functionality to:
//! - Index component manifests and detect duplicate or orphaned files
//! - Parse ELF binaries to extract dependency and ABI-version information
//! - Resolve `RUNPATH`-based dependencies against the declared file universe
//! - Generate reports with an overall consistency verdict

pub mod elf;
pub mod report;
pub mod tree;

// Re-export key types for convenience
pub use elf::SkipReason;
pub use report::{summarize_report, validate_report, Findings, Report};
pub use tree::{ManifestIndex, Root};

use goblin::elf::header::EM_X86_64;

/// Knobs fixed by the caller before a run.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// ELF machine identifier treated as native; binaries for other machines
    /// are skipped without findings.
    pub machine: u16,
    /// Surface dependencies satisfied outside the root in the report. They
    /// never affect the verdict.
    pub report_external_dependencies: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            machine: EM_X86_64,
            report_external_dependencies: false,
        }
    }
}
