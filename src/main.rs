// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
mod args;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::Path;

use args::Args;
use root_validator::report::{summarize_report, validate_report, Report};
use root_validator::tree::Root;
use root_validator::ValidatorConfig;

fn main() -> Result<()> {
    let args = Args::parse();
    let root = load_root(&args.root, &args.manifest_dir)?;
    let config = ValidatorConfig {
        machine: args.arch.machine(),
        report_external_dependencies: args.report_external_dependencies,
    };
    let report = Report::new(&root, &config);
    if let Some(dest) = &args.report {
        write_report_to_file(&report, dest)?;
    }
    summarize_report(&report);
    validate_report(&report)
}

/// Load the declared and installed universes of a root.
///
/// # Errors
/// Returns an error if the root or its manifest directory does not exist.
fn load_root(path: &Path, manifest_dir: &Path) -> Result<Root> {
    eprintln!("Scanning root: root={}", path.display());

    let root = Root::load(path.to_path_buf(), manifest_dir)
        .with_context(|| format!("Failed to load root: {}", path.display()))?;

    eprintln!(
        "Scan completed: root={}, manifests={}, declared={}, installed={}",
        path.display(),
        root.index().manifest_count(),
        root.index().declared().len(),
        root.installed().len()
    );
    Ok(root)
}

/// Write the report to a file.
///
/// # Errors
/// Returns an error if the report cannot be serialized to JSON or if the file cannot be created.
fn write_report_to_file(report: &Report, dest: &Path) -> Result<()> {
    eprintln!("Writing report to file: file={}", dest.display());
    let file = File::create(dest)
        .with_context(|| format!("Failed to create JSON output file: {}", dest.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("Failed to serialize report to JSON: {}", dest.display()))?;
    Ok(())
}
