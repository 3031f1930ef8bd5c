// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Byte-level ELF inspection and the dependency/ABI analysis built on it.

mod analyzer;
mod image;

pub(crate) use analyzer::{Analyzer, BinaryOutcome, BinaryOutcomes, BinaryScan};
pub use image::{ElfError, ElfImage};

use serde::Serialize;

/// Why a candidate binary was excluded from dependency/ABI analysis.
///
/// Skips are not findings: foreign-architecture and static binaries are
/// legitimate, and structural parse limitations are a reader shortcoming
/// rather than a defect of the target binary. They are still recorded so the
/// exclusion is observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// ELF machine does not match the configured host architecture.
    ForeignMachine { machine: u16 },
    /// No dynamic segment; a static binary.
    Static,
    /// More than one dynamic segment.
    MultipleDynamicSegments,
    /// Dynamic-linking metadata could not be located in the file.
    Structural { detail: String },
    /// The file could not be read.
    Unreadable { detail: String },
}
