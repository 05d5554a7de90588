// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bit-exact encoding of the KGKB header and entry table.
//!
//! Both are written with `bincode` using fixed-width little-endian integers:
//! strings are a `u64` byte length followed by UTF-8 bytes and booleans are a
//! single byte. Range, duplicate and version checks are done here by hand.

use bincode::config::Config;
use kgk_core::{ResourceError, ResourceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// File magic of every bundle.
pub const BUNDLE_MAGIC: [u8; 4] = *b"KGKB";
/// The only format version this crate reads and writes.
pub const BUNDLE_VERSION: u32 = 1;
/// Size of the fixed header in bytes.
pub const HEADER_SIZE: u64 = 32;
/// Header flag bit recording that compression was requested at save time.
pub const FLAG_COMPRESSED: u32 = 1;

/// Encoded size of an entry with an empty path.
const MIN_ENTRY_SIZE: u64 = 8 + 8 + 8 + 8 + 4 + 1;
/// Most bytes a single decode may claim; bounds allocations on hostile input.
const DECODE_LIMIT: usize = 64 * 1024;

fn write_config() -> impl Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

fn read_config() -> impl Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
        .with_limit::<DECODE_LIMIT>()
}

/// The fixed-size header at the start of a bundle file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleHeader {
    /// Format version.
    pub version: u32,
    /// Number of entries in the table.
    pub file_count: u32,
    /// Absolute offset of the data section.
    pub data_offset: u64,
    /// Length of the whole file.
    pub total_size: u64,
    /// Flag bits; bit 0 is [`FLAG_COMPRESSED`].
    pub flags: u32,
}

impl BundleHeader {
    /// Whether compression was requested when the bundle was written.
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Size of the data section.
    pub fn data_size(&self) -> u64 {
        self.total_size.saturating_sub(self.data_offset)
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> ResourceResult<()> {
        let bytes = bincode::serde::encode_to_vec((BUNDLE_MAGIC, self), write_config())
            .map_err(|e| ResourceError::InvalidState(format!("failed to encode bundle header: {e}")))?;
        out.extend_from_slice(&bytes);
        Ok(())
    }

    /// Parses and validates a header against the real file length.
    pub(crate) fn decode(bytes: &[u8], file_len: u64, context: &str) -> ResourceResult<Self> {
        let ((magic, header), _): (([u8; 4], BundleHeader), usize) =
            bincode::serde::decode_from_slice(bytes, read_config()).map_err(|e| {
                ResourceError::invalid_format(context, format!("unreadable header: {e}"))
            })?;

        if magic != BUNDLE_MAGIC {
            return Err(ResourceError::invalid_format(
                context,
                format!("bad magic {magic:02x?}, expected \"KGKB\""),
            ));
        }
        if header.version != BUNDLE_VERSION {
            return Err(ResourceError::invalid_format(
                context,
                format!("unsupported bundle version {}", header.version),
            ));
        }
        if header.total_size != file_len {
            return Err(ResourceError::invalid_format(
                context,
                format!(
                    "header declares {} bytes but file has {file_len}",
                    header.total_size
                ),
            ));
        }
        if header.data_offset < HEADER_SIZE || header.data_offset > header.total_size {
            return Err(ResourceError::invalid_format(
                context,
                format!("data offset {} out of range", header.data_offset),
            ));
        }

        Ok(header)
    }
}

/// One entry of the bundle's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Virtual path, unique within the bundle.
    pub path: String,
    /// Offset of the stored bytes, relative to the data section.
    pub offset: u64,
    /// Number of stored bytes.
    pub size: u64,
    /// Number of bytes after decompression.
    pub original_size: u64,
    /// CRC32 of the original bytes.
    pub checksum: u32,
    /// Whether the stored bytes are RLE-compressed.
    pub compressed: bool,
}

impl BundleEntry {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> ResourceResult<()> {
        let bytes = bincode::serde::encode_to_vec(self, write_config()).map_err(|e| {
            ResourceError::InvalidState(format!("failed to encode entry '{}': {e}", self.path))
        })?;
        out.extend_from_slice(&bytes);
        Ok(())
    }

    pub(crate) fn encoded_len(&self) -> u64 {
        MIN_ENTRY_SIZE + self.path.len() as u64
    }
}

/// Parses the entry table occupying `[HEADER_SIZE, data_offset)`.
pub(crate) fn decode_entries(
    table: &[u8],
    header: &BundleHeader,
    context: &str,
) -> ResourceResult<Vec<BundleEntry>> {
    // Every entry takes at least MIN_ENTRY_SIZE bytes, so the table bounds the count.
    if u64::from(header.file_count) > table.len() as u64 / MIN_ENTRY_SIZE {
        return Err(ResourceError::invalid_format(
            context,
            format!(
                "{} entries cannot fit in a {}-byte entry table",
                header.file_count,
                table.len()
            ),
        ));
    }

    let data_size = header.data_size();
    let mut seen = HashSet::with_capacity(header.file_count as usize);
    let mut entries = Vec::with_capacity(header.file_count as usize);
    let mut rest = table;

    for _ in 0..header.file_count {
        let (entry, read): (BundleEntry, usize) =
            bincode::serde::decode_from_slice(rest, read_config()).map_err(|e| {
                ResourceError::invalid_format(context, format!("unreadable entry table: {e}"))
            })?;
        rest = &rest[read..];

        let in_range = matches!(entry.offset.checked_add(entry.size), Some(end) if end <= data_size);
        if !in_range {
            return Err(ResourceError::invalid_format(
                context,
                format!(
                    "entry '{}' [{}, +{}) lies outside the data section",
                    entry.path, entry.offset, entry.size
                ),
            ));
        }
        if !entry.compressed && entry.size != entry.original_size {
            return Err(ResourceError::invalid_format(
                context,
                format!("uncompressed entry '{}' has mismatched sizes", entry.path),
            ));
        }
        if !seen.insert(entry.path.clone()) {
            return Err(ResourceError::invalid_format(
                context,
                format!("duplicate entry '{}'", entry.path),
            ));
        }

        entries.push(entry);
    }

    if !rest.is_empty() {
        return Err(ResourceError::invalid_format(
            context,
            format!("{} trailing bytes after the entry table", rest.len()),
        ));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgk_core::ErrorKind;

    fn header(total_size: u64) -> BundleHeader {
        BundleHeader {
            version: BUNDLE_VERSION,
            file_count: 0,
            data_offset: HEADER_SIZE,
            total_size,
            flags: FLAG_COMPRESSED,
        }
    }

    fn entry(path: &str, offset: u64, size: u64) -> BundleEntry {
        BundleEntry {
            path: path.into(),
            offset,
            size,
            original_size: size,
            checksum: 0,
            compressed: false,
        }
    }

    #[test]
    fn header_layout_is_32_bytes() {
        let mut out = Vec::new();
        header(HEADER_SIZE).encode(&mut out).unwrap();
        assert_eq!(out.len() as u64, HEADER_SIZE);
        assert_eq!(&out[..4], b"KGKB");
        assert_eq!(&out[4..8], &1u32.to_le_bytes());
        assert_eq!(&out[12..20], &HEADER_SIZE.to_le_bytes());
        assert_eq!(&out[28..32], &FLAG_COMPRESSED.to_le_bytes());

        let parsed = BundleHeader::decode(&out, HEADER_SIZE, "test").unwrap();
        assert!(parsed.is_compressed());
        assert_eq!(parsed.data_size(), 0);
    }

    #[test]
    fn entry_layout_uses_a_u64_path_length() {
        let e = entry("a.bin", 4, 8);
        let mut out = Vec::new();
        e.encode(&mut out).unwrap();
        assert_eq!(out.len() as u64, e.encoded_len());
        assert_eq!(&out[..8], &5u64.to_le_bytes());
        assert_eq!(&out[8..13], b"a.bin");
        assert_eq!(out[out.len() - 1], 0);
    }

    #[test]
    fn header_validation() {
        let mut out = Vec::new();
        header(HEADER_SIZE).encode(&mut out).unwrap();

        let mut bad_magic = out.clone();
        bad_magic[0] = b'X';
        let err = BundleHeader::decode(&bad_magic, HEADER_SIZE, "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);

        let mut bad_version = out.clone();
        bad_version[4] = 9;
        assert!(BundleHeader::decode(&bad_version, HEADER_SIZE, "test").is_err());

        assert!(BundleHeader::decode(&out, HEADER_SIZE + 1, "test").is_err());
        let err = BundleHeader::decode(&out[..20], HEADER_SIZE, "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn oversized_file_count_is_rejected_before_allocating() {
        let mut hdr = header(HEADER_SIZE);
        hdr.file_count = u32::MAX;
        let err = decode_entries(&[], &hdr, "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);

        let mut table = Vec::new();
        entry("a", 0, 0).encode(&mut table).unwrap();
        hdr.total_size = HEADER_SIZE + table.len() as u64;
        hdr.data_offset = hdr.total_size;
        let err = decode_entries(&table, &hdr, "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn huge_path_length_is_invalid_format() {
        let mut table = Vec::new();
        entry("a", 0, 0).encode(&mut table).unwrap();
        table[..8].copy_from_slice(&u64::MAX.to_le_bytes());

        let mut hdr = header(HEADER_SIZE + table.len() as u64);
        hdr.file_count = 1;
        hdr.data_offset = hdr.total_size;
        let err = decode_entries(&table, &hdr, "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn entry_table_rejects_out_of_range_entries() {
        let e = entry("a.bin", 4, 8);
        let mut table = Vec::new();
        e.encode(&mut table).unwrap();

        let mut hdr = header(HEADER_SIZE + table.len() as u64 + 12);
        hdr.file_count = 1;
        hdr.data_offset = HEADER_SIZE + table.len() as u64;
        assert_eq!(decode_entries(&table, &hdr, "t").unwrap(), vec![e.clone()]);

        hdr.total_size -= 1;
        let err = decode_entries(&table, &hdr, "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn entry_table_rejects_bad_flags_duplicates_and_trailing_bytes() {
        let e = entry("dup", 0, 0);
        let mut table = Vec::new();
        e.encode(&mut table).unwrap();
        e.encode(&mut table).unwrap();

        let mut hdr = header(HEADER_SIZE + table.len() as u64);
        hdr.file_count = 2;
        hdr.data_offset = hdr.total_size;
        assert!(decode_entries(&table, &hdr, "t").is_err());

        hdr.file_count = 1;
        assert!(decode_entries(&table, &hdr, "t").is_err());

        let single = &mut table[..e.encoded_len() as usize];
        single[single.len() - 1] = 7;
        let mut hdr = header(HEADER_SIZE + single.len() as u64);
        hdr.file_count = 1;
        hdr.data_offset = hdr.total_size;
        let err = decode_entries(single, &hdr, "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }
}
