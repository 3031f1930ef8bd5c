// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
use clap::{Parser, ValueEnum};
use goblin::elf::header::{EM_AARCH64, EM_X86_64};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "root_validator")]
#[command(version)]
#[command(about = "Audits an installed root for manifest and dynamic-linking consistency")]
pub(crate) struct Args {
    /// Path to the installed root to verify.
    pub root: PathBuf,

    /// Path to a file to write the full report in JSON format.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Directory containing the component manifests, relative to the root.
    #[arg(long, default_value = "share/components")]
    pub manifest_dir: PathBuf,

    /// Machine architecture treated as native; binaries for other machines
    /// are skipped without being reported.
    #[arg(long, value_enum, default_value = "x86-64")]
    pub arch: Arch,

    #[arg(
        long,
        long_help = "Include dependencies satisfied outside the root in the report.\n\
                These are collected in any case but never affect the verdict."
    )]
    pub report_external_dependencies: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum Arch {
    #[value(name = "x86-64")]
    X86_64,
    #[value(name = "aarch64")]
    Aarch64,
}

impl Arch {
    pub(crate) fn machine(self) -> u16 {
        match self {
            Self::X86_64 => EM_X86_64,
            Self::Aarch64 => EM_AARCH64,
        }
    }
}
