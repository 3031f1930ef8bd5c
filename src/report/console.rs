// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Formats and prints report summaries to the console.

use comfy_table::{Cell, Table};
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::Report;

/// Summarize the report to the console.
///
/// Prints the universe statistics, the finding counts, and a detail table for
/// every non-empty finding category.
pub fn summarize_report(report: &Report) {
    println!("Root: {}", report.root);
    println!(
        "Manifests: {}, declared files: {}, installed files: {}\n",
        report.totals.manifests, report.totals.declared_files, report.totals.installed_files
    );

    println!("{}\n", binary_table(report));
    println!("{}\n", finding_table(report));

    let findings = &report.findings;
    print_path_list("Missing declared files", &findings.missing);
    print_path_list("Orphan installed files", &findings.orphans);
    print_grouped(
        "Duplicate Ownership",
        "File",
        "Manifests",
        findings
            .duplicates
            .iter()
            .map(|(file, owners)| (file.display().to_string(), join_paths(owners.iter()))),
    );
    print_grouped(
        "Invalid RUNPATH Entries",
        "Entry",
        "Binaries",
        findings
            .invalid_runpaths
            .iter()
            .map(|(entry, binaries)| (entry.clone(), join_paths(binaries.iter()))),
    );
    print_grouped(
        "Unreachable Libraries",
        "Library",
        "Providers / Consumers",
        findings.unreachable_libraries.iter().map(|(name, lib)| {
            (
                name.clone(),
                format!(
                    "{} / {}",
                    join_paths(lib.providers.iter()),
                    join_paths(lib.consumers.iter())
                ),
            )
        }),
    );
    print_grouped(
        "Disallowed ABI Versions",
        "Version",
        "Binaries",
        findings
            .disallowed_versions
            .iter()
            .map(|(version, binaries)| (version.clone(), join_paths(binaries.iter()))),
    );
    print_grouped(
        "External Dependencies",
        "Library",
        "Consumers",
        findings
            .external_dependencies
            .iter()
            .map(|(name, consumers)| (name.clone(), join_paths(consumers.iter()))),
    );
    print_grouped(
        "Skipped Binaries",
        "Binary",
        "Reason",
        report
            .skipped
            .iter()
            .map(|(path, reason)| (path.display().to_string(), format!("{reason:?}"))),
    );
}

/// Create a table with the default preset styling.
fn default_table_preset() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL_CONDENSED)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(comfy_table::Attribute::Bold)
}

/// Create a table showing binary scan statistics.
fn binary_table(report: &Report) -> Table {
    let mut table = default_table_preset();
    table
        .set_header(vec![bold("Binaries"), bold("Count")])
        .add_row(vec![
            Cell::new("Analyzed"),
            Cell::new(report.totals.binaries.analyzed),
        ])
        .add_row(vec![
            Cell::new("Link-only stubs"),
            Cell::new(report.totals.binaries.link_only),
        ])
        .add_row(vec![
            Cell::new("Skipped"),
            Cell::new(report.totals.binaries.skipped),
        ])
        .add_row(vec![
            bold("Total"),
            Cell::new(report.totals.binaries.total)
                .add_attribute(comfy_table::Attribute::Bold),
        ]);
    table
}

/// Create a table showing finding counts per category.
fn finding_table(report: &Report) -> Table {
    let totals = &report.totals.findings;
    let mut table = default_table_preset();
    table
        .set_header(vec![bold("Finding"), bold("Count")])
        .add_row(vec![Cell::new("Duplicate ownership"), Cell::new(totals.duplicates)])
        .add_row(vec![Cell::new("Missing declared files"), Cell::new(totals.missing)])
        .add_row(vec![Cell::new("Orphan installed files"), Cell::new(totals.orphans)])
        .add_row(vec![
            Cell::new("Invalid RUNPATH entries"),
            Cell::new(totals.invalid_runpaths),
        ])
        .add_row(vec![
            Cell::new("Unreachable libraries"),
            Cell::new(totals.unreachable_libraries),
        ])
        .add_row(vec![
            Cell::new("Disallowed ABI versions"),
            Cell::new(totals.disallowed_versions),
        ])
        .add_row(vec![
            Cell::new("External dependencies (informational)"),
            Cell::new(totals.external_dependencies),
        ]);
    table
}

fn print_path_list(title: &str, paths: &BTreeSet<PathBuf>) {
    if paths.is_empty() {
        return;
    }
    let mut table = default_table_preset();
    table.set_header(vec![bold(title)]);
    for path in paths {
        table.add_row(vec![Cell::new(path.display().to_string())]);
    }
    println!("{table}\n");
}

fn print_grouped(
    title: &str,
    key_header: &str,
    value_header: &str,
    rows: impl Iterator<Item = (String, String)>,
) {
    let rows: Vec<_> = rows.collect();
    if rows.is_empty() {
        return;
    }
    let mut table = default_table_preset();
    table.set_header(vec![bold(key_header), bold(value_header)]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    println!("{title}:\n{table}\n");
}

fn join_paths<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> String {
    paths
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
