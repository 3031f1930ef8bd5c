// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Maps the report verdict onto a process-level result.

use super::Report;
use anyhow::Result;

/// Validate the report.
///
/// # Errors
/// Returns an error if any finding category that counts toward the verdict is
/// non-empty. External dependencies and skipped binaries never fail a run.
pub fn validate_report(report: &Report) -> Result<()> {
    let findings = &report.findings;
    if findings.is_consistent() {
        return Ok(());
    }

    let categories = [
        ("duplicate ownership", findings.duplicates.len()),
        ("missing declared files", findings.missing.len()),
        ("orphan installed files", findings.orphans.len()),
        ("invalid RUNPATH entries", findings.invalid_runpaths.len()),
        (
            "unreachable libraries",
            findings.unreachable_libraries.len(),
        ),
        ("disallowed ABI versions", findings.disallowed_versions.len()),
    ];
    let mut total = 0;
    for (name, count) in categories {
        if count > 0 {
            eprintln!("ERROR: {count} {name} finding(s)");
            total += count;
        }
    }
    Err(anyhow::anyhow!(
        "Root is inconsistent: {total} finding(s) across {} categories",
        categories.iter().filter(|(_, count)| *count > 0).count()
    ))
}
