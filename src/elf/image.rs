// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Byte-level ELF reader. Uses the `goblin` crate for header and program
//! header parsing; address translation, dynamic tag walks, and string table
//! extraction work on the raw bytes.

use goblin::elf::dynamic::{DT_STRSZ, DT_STRTAB};
use goblin::elf::program_header::{PT_DYNAMIC, PT_LOAD};
use goblin::elf::Elf as GoblinElf;
use std::fs;
use std::io;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;

type Result<T> = std::result::Result<T, ElfError>;

// ELF magic bytes: 0x7f followed by ASCII "ELF"
// Defined in the ELF specification: e_ident[EI_MAG0..EI_MAG3]
const ELF_MAGIC: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];

/// Errors that can occur when reading ELF files.
#[derive(Debug, Error)]
pub enum ElfError {
    #[error("File is too small to be an ELF file: {path:?}")]
    FileTooSmall { path: PathBuf },
    #[error("File is not an ELF file: {path:?}")]
    NotElfFile { path: PathBuf },
    #[error("Failed to open file: {path:?}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read file: {path:?}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse ELF file: {path:?}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: goblin::error::Error,
    },
    #[error("Dynamic tag {name} is missing")]
    MissingTag { name: &'static str },
    #[error("Dynamic tag {name} appears more than once")]
    DuplicateTag { name: &'static str },
    #[error("Virtual address {address:#x} is not covered by any loadable segment")]
    UnresolvableAddress { address: u64 },
    #[error("Virtual address {address:#x} is covered by more than one loadable segment")]
    AmbiguousAddress { address: u64 },
    #[error("String table lies outside the file")]
    StringTableOutOfBounds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadSegment {
    offset: u64,
    vaddr: u64,
    memsz: u64,
}

/// A parsed ELF image: the raw file bytes plus the header-level structures
/// needed to work with the dynamic segment at byte level.
#[derive(Debug)]
pub struct ElfImage {
    bytes: Vec<u8>,
    machine: u16,
    load_segments: Vec<LoadSegment>,
    dynamic_segments: usize,
    // Dynamic tag table in file order, (d_tag, d_val) pairs.
    dynamic: Vec<(u64, u64)>,
}

impl ElfImage {
    /// Check whether the first four bytes of `path` are the ELF magic, without
    /// reading the rest of the file. Unreadable files count as non-ELF.
    #[must_use]
    pub fn is_elf(path: &Path) -> bool {
        let mut magic = [0u8; 4];
        fs::File::open(path)
            .and_then(|mut file| file.read_exact(&mut magic))
            .map(|()| magic == ELF_MAGIC)
            .unwrap_or(false)
    }

    /// Parse an ELF file from a path.
    ///
    /// # Errors
    /// Returns an error if the file is not an ELF file or cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = Self::read(path)?;
        let elf = GoblinElf::parse(&bytes).map_err(|e| ElfError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let load_segments = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_LOAD)
            .map(|ph| LoadSegment {
                offset: ph.p_offset,
                vaddr: ph.p_vaddr,
                memsz: ph.p_memsz,
            })
            .collect();
        let dynamic_segments = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_DYNAMIC)
            .count();
        let dynamic = elf
            .dynamic
            .as_ref()
            .map(|dynamic| {
                dynamic
                    .dyns
                    .iter()
                    .map(|entry| (entry.d_tag, entry.d_val))
                    .collect()
            })
            .unwrap_or_default();

        let machine = elf.header.e_machine;
        Ok(Self {
            bytes,
            machine,
            load_segments,
            dynamic_segments,
            dynamic,
        })
    }

    /// The ELF machine identifier (`e_machine`).
    #[must_use]
    pub fn machine(&self) -> u16 {
        self.machine
    }

    /// Number of program headers of type `PT_DYNAMIC`. A well-formed dynamic
    /// binary has exactly one.
    #[must_use]
    pub fn dynamic_segment_count(&self) -> usize {
        self.dynamic_segments
    }

    /// Ordered (tag, value) pairs from the dynamic segment.
    #[must_use]
    pub fn dynamic_tags(&self) -> &[(u64, u64)] {
        &self.dynamic
    }

    /// Translate a virtual address to a file offset through the loadable
    /// segment whose `[vaddr, vaddr + memsz)` range contains it.
    ///
    /// # Errors
    /// Returns an error if zero or more than one segment matches.
    pub fn resolve_address_to_offset(&self, address: u64) -> Result<u64> {
        let mut matches = self.load_segments.iter().filter(|segment| {
            address >= segment.vaddr && address - segment.vaddr < segment.memsz
        });
        let segment = matches
            .next()
            .ok_or(ElfError::UnresolvableAddress { address })?;
        if matches.next().is_some() {
            return Err(ElfError::AmbiguousAddress { address });
        }
        Ok(segment.offset + (address - segment.vaddr))
    }

    /// The raw dynamic string table: exactly `DT_STRSZ` bytes at the file
    /// offset the `DT_STRTAB` address translates to.
    ///
    /// # Errors
    /// Returns an error if either tag is missing or ambiguous, the address
    /// does not translate, or the table extends past the end of the file.
    pub fn string_table(&self) -> Result<&[u8]> {
        let strtab = self.unique_tag(DT_STRTAB, "DT_STRTAB")?;
        let strsz = self.unique_tag(DT_STRSZ, "DT_STRSZ")?;
        let offset = usize::try_from(self.resolve_address_to_offset(strtab)?)
            .map_err(|_| ElfError::StringTableOutOfBounds)?;
        let size = usize::try_from(strsz).map_err(|_| ElfError::StringTableOutOfBounds)?;
        offset
            .checked_add(size)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(ElfError::StringTableOutOfBounds)
    }

    /// Read the null-terminated string at `offset` within a string table.
    /// Returns `None` for out-of-range offsets, unterminated strings, and
    /// non-UTF-8 bytes.
    #[must_use]
    pub fn string_at(table: &[u8], offset: u64) -> Option<&str> {
        let start = usize::try_from(offset).ok()?;
        let tail = table.get(start..)?;
        let end = tail.iter().position(|byte| *byte == 0)?;
        std::str::from_utf8(&tail[..end]).ok()
    }

    fn unique_tag(&self, tag: u64, name: &'static str) -> Result<u64> {
        let mut values = self
            .dynamic
            .iter()
            .filter(|(entry_tag, _)| *entry_tag == tag)
            .map(|(_, value)| *value);
        let value = values.next().ok_or(ElfError::MissingTag { name })?;
        if values.next().is_some() {
            return Err(ElfError::DuplicateTag { name });
        }
        Ok(value)
    }

    /// Reads the entire file at path into bytes if the file is an ELF file.
    fn read(path: &Path) -> Result<Vec<u8>> {
        let metadata = fs::metadata(path).map_err(|e| ElfError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Skip files that are too small to be ELF (must be at least ELF header size)
        if metadata.len() < 64 {
            return Err(ElfError::FileTooSmall {
                path: path.to_path_buf(),
            });
        }

        let mut file = fs::File::open(path).map_err(|e| ElfError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|e| ElfError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        if magic != ELF_MAGIC {
            return Err(ElfError::NotElfFile {
                path: path.to_path_buf(),
            });
        }

        // Reset to beginning and read the entire file; goblin needs the full
        // buffer and offset arithmetic works on it directly.
        file.seek(io::SeekFrom::Start(0))
            .map_err(|e| ElfError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| ElfError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(bytes)
    }

    #[cfg(test)]
    /// Create an image from prebuilt parts. Only available in test builds.
    pub(crate) fn new_for_testing(
        bytes: Vec<u8>,
        machine: u16,
        load_segments: Vec<(u64, u64, u64)>,
        dynamic: Vec<(u64, u64)>,
    ) -> Self {
        Self {
            bytes,
            machine,
            load_segments: load_segments
                .into_iter()
                .map(|(offset, vaddr, memsz)| LoadSegment {
                    offset,
                    vaddr,
                    memsz,
                })
                .collect(),
            dynamic_segments: 1,
            dynamic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn image_with_segments(segments: Vec<(u64, u64, u64)>) -> ElfImage {
        ElfImage::new_for_testing(vec![0u8; 0x100], 62, segments, Vec::new())
    }

    #[test]
    fn test_resolve_address_unique_segment() {
        let image = image_with_segments(vec![(0x40, 0x1000, 0x100)]);
        assert_eq!(image.resolve_address_to_offset(0x1010).unwrap(), 0x50);
    }

    #[test]
    fn test_resolve_address_no_segment() {
        let image = image_with_segments(vec![(0x40, 0x1000, 0x100)]);
        let result = image.resolve_address_to_offset(0x2000);
        assert!(matches!(
            result,
            Err(ElfError::UnresolvableAddress { address: 0x2000 })
        ));
    }

    #[test]
    fn test_resolve_address_ambiguous_segments() {
        let image = image_with_segments(vec![(0x40, 0x1000, 0x100), (0x80, 0x1000, 0x200)]);
        let result = image.resolve_address_to_offset(0x1010);
        assert!(matches!(result, Err(ElfError::AmbiguousAddress { .. })));
    }

    #[test]
    fn test_string_table_requires_unique_tags() {
        let table_bytes = b"\0libfoo.so\0".to_vec();
        let dynamic = vec![
            (goblin::elf::dynamic::DT_STRTAB, 0x1000),
            (goblin::elf::dynamic::DT_STRSZ, table_bytes.len() as u64),
        ];
        let image = ElfImage::new_for_testing(
            table_bytes.clone(),
            62,
            vec![(0, 0x1000, table_bytes.len() as u64)],
            dynamic,
        );
        assert_eq!(image.string_table().unwrap(), table_bytes.as_slice());

        let missing = ElfImage::new_for_testing(Vec::new(), 62, Vec::new(), Vec::new());
        assert!(matches!(
            missing.string_table(),
            Err(ElfError::MissingTag { name: "DT_STRTAB" })
        ));

        let duplicated = ElfImage::new_for_testing(
            vec![0u8; 16],
            62,
            vec![(0, 0, 16)],
            vec![
                (goblin::elf::dynamic::DT_STRTAB, 0),
                (goblin::elf::dynamic::DT_STRTAB, 4),
                (goblin::elf::dynamic::DT_STRSZ, 4),
            ],
        );
        assert!(matches!(
            duplicated.string_table(),
            Err(ElfError::DuplicateTag { name: "DT_STRTAB" })
        ));
    }

    #[test]
    fn test_string_table_out_of_bounds() {
        let image = ElfImage::new_for_testing(
            vec![0u8; 8],
            62,
            vec![(0, 0, 8)],
            vec![
                (goblin::elf::dynamic::DT_STRTAB, 4),
                (goblin::elf::dynamic::DT_STRSZ, 16),
            ],
        );
        assert!(matches!(
            image.string_table(),
            Err(ElfError::StringTableOutOfBounds)
        ));
    }

    #[test]
    fn test_string_at() {
        let table = b"\0libfoo.so\0lib64\0";
        assert_eq!(ElfImage::string_at(table, 1), Some("libfoo.so"));
        assert_eq!(ElfImage::string_at(table, 11), Some("lib64"));
        assert_eq!(ElfImage::string_at(table, 0), Some(""));
        // Out of range and unterminated reads yield None.
        assert_eq!(ElfImage::string_at(table, 64), None);
        assert_eq!(ElfImage::string_at(b"abc", 0), None);
    }

    #[test]
    fn test_is_elf_rejects_other_files() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"#!/bin/sh\necho hi\n").unwrap();
        file.flush().unwrap();
        assert!(!ElfImage::is_elf(file.path()));
        assert!(!ElfImage::is_elf(Path::new("/nonexistent/file")));
    }

    #[test]
    fn test_from_path_rejects_small_and_non_elf_files() {
        let mut small = NamedTempFile::new().unwrap();
        small.write_all(b"\x7fELF").unwrap();
        small.flush().unwrap();
        assert!(matches!(
            ElfImage::from_path(small.path()),
            Err(ElfError::FileTooSmall { .. })
        ));

        let mut other = NamedTempFile::new().unwrap();
        other.write_all(&[0u8; 128]).unwrap();
        other.flush().unwrap();
        assert!(matches!(
            ElfImage::from_path(other.path()),
            Err(ElfError::NotElfFile { .. })
        ));
    }
}
