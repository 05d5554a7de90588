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

//! The KGKB packed-resource container.
//!
//! A bundle is written in two phases: files are staged in memory with
//! [`BundleContainer::add_file`], [`BundleContainer::add_data`] or
//! [`BundleContainer::add_directory`], then serialized with
//! [`BundleContainer::save`]. Reading goes through [`BundleContainer::load`]
//! (eager), [`BundleContainer::open`] (lazy, entries are read by seeking into
//! the file) or [`BundleContainer::from_bytes`].
//!
//! Every read verifies the entry's CRC32 against the original bytes; a
//! damaged entry fails on its own without affecting its neighbours.

mod format;
mod rle;

pub use format::{BundleEntry, BundleHeader, BUNDLE_MAGIC, BUNDLE_VERSION, FLAG_COMPRESSED, HEADER_SIZE};

use kgk_core::{normalize_path, ResourceError, ResourceResult};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

/// Where the stored bytes of a read bundle live.
enum DataSection {
    /// Nothing has been read; the container only holds staged files.
    Empty,
    /// The whole data section, held in memory.
    Memory(Vec<u8>),
    /// An open handle on the bundle file; entries are read on demand.
    File { file: Mutex<File>, data_offset: u64 },
}

/// An in-memory view of a KGKB bundle, plus any files staged for saving.
pub struct BundleContainer {
    source: String,
    header: Option<BundleHeader>,
    entries: Vec<BundleEntry>,
    index: HashMap<String, usize>,
    data: DataSection,
    staged: Vec<(String, Vec<u8>)>,
    staged_index: HashMap<String, usize>,
}

impl BundleContainer {
    /// Creates an empty container ready for staging.
    pub fn new() -> Self {
        Self {
            source: String::from("<memory>"),
            header: None,
            entries: Vec::new(),
            index: HashMap::new(),
            data: DataSection::Empty,
            staged: Vec::new(),
            staged_index: HashMap::new(),
        }
    }

    // --- Write path ---

    /// Stages `bytes` under `virtual_path`, replacing any earlier staging of the same path.
    pub fn add_data(&mut self, virtual_path: &str, bytes: impl Into<Vec<u8>>) -> ResourceResult<()> {
        let path = normalize_path(virtual_path);
        if path.is_empty() {
            return Err(ResourceError::InvalidParameter(format!(
                "empty virtual path '{virtual_path}'"
            )));
        }

        let bytes = bytes.into();
        match self.staged_index.get(&path) {
            Some(&slot) => self.staged[slot].1 = bytes,
            None => {
                self.staged_index.insert(path.clone(), self.staged.len());
                self.staged.push((path, bytes));
            }
        }
        Ok(())
    }

    /// Reads a file from disk and stages it under `virtual_path`.
    pub fn add_file(&mut self, disk_path: impl AsRef<Path>, virtual_path: &str) -> ResourceResult<()> {
        let disk_path = disk_path.as_ref();
        let bytes = fs::read(disk_path).map_err(|e| ResourceError::io(disk_path, e))?;
        self.add_data(virtual_path, bytes)
    }

    /// Stages every file below `dir`, keyed by its forward-slash path relative to
    /// `dir` and prefixed with `prefix`. Returns the number of files staged.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>, prefix: &str) -> ResourceResult<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ResourceError::FileNotFound {
                path: dir.display().to_string(),
            });
        }

        let prefix = normalize_path(prefix);
        let mut added = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| ResourceError::io(dir, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|_| {
                    ResourceError::InvalidState(format!(
                        "'{}' is not below '{}'",
                        entry.path().display(),
                        dir.display()
                    ))
                })?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let virtual_path = if prefix.is_empty() {
                relative
            } else {
                format!("{prefix}/{relative}")
            };

            self.add_file(entry.path(), &virtual_path)?;
            added += 1;
        }

        log::debug!("Staged {added} files from '{}'", dir.display());
        Ok(added)
    }

    /// Serializes every entry (read and staged) into a bundle image.
    pub fn to_bytes(&self, compress: bool) -> ResourceResult<Vec<u8>> {
        self.encode(compress).map(|(_, bytes)| bytes)
    }

    /// Writes the bundle to `path` and returns the header that was written.
    pub fn save(&self, path: impl AsRef<Path>, compress: bool) -> ResourceResult<BundleHeader> {
        let path = path.as_ref();
        let (header, bytes) = self.encode(compress)?;
        fs::write(path, &bytes).map_err(|e| ResourceError::io(path, e))?;
        log::info!(
            "Wrote bundle '{}': {} entries, {} bytes (compressed={})",
            path.display(),
            header.file_count,
            header.total_size,
            compress
        );
        Ok(header)
    }

    fn encode(&self, compress: bool) -> ResourceResult<(BundleHeader, Vec<u8>)> {
        let files = self.collect_files()?;
        let file_count = u32::try_from(files.len()).map_err(|_| {
            ResourceError::InvalidParameter(format!("too many entries ({})", files.len()))
        })?;

        let mut entries = Vec::with_capacity(files.len());
        let mut blob = Vec::new();
        for (path, original) in files {
            let checksum = crc32fast::hash(&original);
            let original_size = original.len() as u64;
            let (stored, compressed) = if compress {
                let encoded = rle::encode(&original);
                if encoded.len() < original.len() {
                    (encoded, true)
                } else {
                    (original, false)
                }
            } else {
                (original, false)
            };

            entries.push(BundleEntry {
                path,
                offset: blob.len() as u64,
                size: stored.len() as u64,
                original_size,
                checksum,
                compressed,
            });
            blob.extend_from_slice(&stored);
        }

        let table_len: u64 = entries.iter().map(BundleEntry::encoded_len).sum();
        let data_offset = HEADER_SIZE + table_len;
        let header = BundleHeader {
            version: BUNDLE_VERSION,
            file_count,
            data_offset,
            total_size: data_offset + blob.len() as u64,
            flags: if compress { FLAG_COMPRESSED } else { 0 },
        };

        let mut out = Vec::with_capacity(header.total_size as usize);
        header.encode(&mut out)?;
        for entry in &entries {
            entry.encode(&mut out)?;
        }
        out.extend_from_slice(&blob);
        Ok((header, out))
    }

    /// Every file's original bytes: read entries first (unless re-staged), then staged files.
    fn collect_files(&self) -> ResourceResult<Vec<(String, Vec<u8>)>> {
        let mut files = Vec::with_capacity(self.entries.len() + self.staged.len());
        for entry in &self.entries {
            if !self.staged_index.contains_key(&entry.path) {
                files.push((entry.path.clone(), self.read_entry(entry)?));
            }
        }
        files.extend(self.staged.iter().cloned());
        Ok(files)
    }

    // --- Read path ---

    /// Reads a whole bundle file into memory.
    pub fn load(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ResourceError::io(path, e))?;
        let bundle = Self::from_bytes(bytes, &path.display().to_string())?;
        log::debug!(
            "Loaded bundle '{}' ({} entries)",
            path.display(),
            bundle.entries.len()
        );
        Ok(bundle)
    }

    /// Parses a bundle image held in memory. `source` names it in errors.
    pub fn from_bytes(mut bytes: Vec<u8>, source: &str) -> ResourceResult<Self> {
        let header_len = (HEADER_SIZE as usize).min(bytes.len());
        let header = BundleHeader::decode(&bytes[..header_len], bytes.len() as u64, source)?;
        let entries = format::decode_entries(
            &bytes[HEADER_SIZE as usize..header.data_offset as usize],
            &header,
            source,
        )?;

        let data = bytes.split_off(header.data_offset as usize);
        Ok(Self::with_entries(
            source.to_string(),
            header,
            entries,
            DataSection::Memory(data),
        ))
    }

    /// Opens a bundle file, reading only its header and entry table.
    ///
    /// Entry bytes are read from the file each time they are requested.
    pub fn open(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let io_err = |e| ResourceError::io(path, e);

        let mut file = File::open(path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len();

        let mut header_bytes = vec![0u8; (HEADER_SIZE.min(file_len)) as usize];
        file.read_exact(&mut header_bytes).map_err(io_err)?;
        let header = BundleHeader::decode(&header_bytes, file_len, &source)?;

        let mut table = vec![0u8; (header.data_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut table).map_err(io_err)?;
        let entries = format::decode_entries(&table, &header, &source)?;

        log::debug!("Opened bundle '{source}' lazily ({} entries)", entries.len());
        Ok(Self::with_entries(
            source,
            header,
            entries,
            DataSection::File {
                file: Mutex::new(file),
                data_offset: header.data_offset,
            },
        ))
    }

    fn with_entries(
        source: String,
        header: BundleHeader,
        entries: Vec<BundleEntry>,
        data: DataSection,
    ) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path.clone(), i))
            .collect();
        Self {
            source,
            header: Some(header),
            entries,
            index,
            data,
            staged: Vec::new(),
            staged_index: HashMap::new(),
        }
    }

    /// Returns the original bytes of `virtual_path`, verifying its checksum.
    pub fn get_data(&self, virtual_path: &str) -> ResourceResult<Vec<u8>> {
        let path = normalize_path(virtual_path);
        if let Some(&slot) = self.staged_index.get(&path) {
            return Ok(self.staged[slot].1.clone());
        }

        let entry = self
            .entry(&path)
            .ok_or_else(|| ResourceError::FileNotFound { path: path.clone() })?;
        self.read_entry(entry)
    }

    fn read_entry(&self, entry: &BundleEntry) -> ResourceResult<Vec<u8>> {
        let stored = self.read_stored(entry)?;
        let bytes = if entry.compressed {
            match rle::decode(&stored, entry.original_size as usize) {
                Some(bytes) => bytes,
                None => {
                    return Err(ResourceError::CorruptedData {
                        path: entry.path.clone(),
                        expected: entry.checksum,
                        actual: crc32fast::hash(&stored),
                    })
                }
            }
        } else {
            stored
        };

        let actual = crc32fast::hash(&bytes);
        if actual != entry.checksum {
            return Err(ResourceError::CorruptedData {
                path: entry.path.clone(),
                expected: entry.checksum,
                actual,
            });
        }
        Ok(bytes)
    }

    fn read_stored(&self, entry: &BundleEntry) -> ResourceResult<Vec<u8>> {
        match &self.data {
            DataSection::Memory(data) => {
                let start = entry.offset as usize;
                Ok(data[start..start + entry.size as usize].to_vec())
            }
            DataSection::File { file, data_offset } => {
                let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
                let mut buffer = vec![0; entry.size as usize];
                file.seek(SeekFrom::Start(data_offset + entry.offset))
                    .map_err(|e| ResourceError::io(&self.source, e))?;
                file.read_exact(&mut buffer)
                    .map_err(|e| ResourceError::io(&self.source, e))?;
                Ok(buffer)
            }
            DataSection::Empty => Err(ResourceError::InvalidState(format!(
                "bundle '{}' has no data section",
                self.source
            ))),
        }
    }

    // --- Lookups (never touch the data section) ---

    /// Whether `virtual_path` is present, read or staged.
    pub fn contains(&self, virtual_path: &str) -> bool {
        let path = normalize_path(virtual_path);
        self.index.contains_key(&path) || self.staged_index.contains_key(&path)
    }

    /// Every virtual path: read entries in table order, then newly staged files.
    pub fn file_list(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.path.clone())
            .chain(
                self.staged
                    .iter()
                    .filter(|(path, _)| !self.index.contains_key(path))
                    .map(|(path, _)| path.clone()),
            )
            .collect()
    }

    /// The table entry for `virtual_path`, if the bundle was read from a file or image.
    pub fn entry(&self, virtual_path: &str) -> Option<&BundleEntry> {
        self.index
            .get(&normalize_path(virtual_path))
            .map(|&i| &self.entries[i])
    }

    /// All table entries in table order.
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// The parsed header, if the bundle was read.
    pub fn header(&self) -> Option<&BundleHeader> {
        self.header.as_ref()
    }

    /// The file or label this bundle was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of distinct virtual paths.
    pub fn file_count(&self) -> usize {
        self.entries.len()
            + self
                .staged
                .iter()
                .filter(|(path, _)| !self.index.contains_key(path))
                .count()
    }

    /// Stored bytes of read entries plus staged bytes.
    pub fn stored_size(&self) -> u64 {
        let read: u64 = self.entries.iter().map(|entry| entry.size).sum();
        let staged: u64 = self.staged.iter().map(|(_, bytes)| bytes.len() as u64).sum();
        read + staged
    }

    /// Bytes this container keeps resident.
    pub fn memory_usage(&self) -> u64 {
        let table: u64 = self.entries.iter().map(BundleEntry::encoded_len).sum();
        let staged: u64 = self.staged.iter().map(|(_, bytes)| bytes.len() as u64).sum();
        let data = match &self.data {
            DataSection::Memory(data) => data.len() as u64,
            DataSection::File { .. } | DataSection::Empty => 0,
        };
        table + staged + data
    }

    /// Reads every entry and returns those that fail, with their error.
    pub fn verify(&self) -> Vec<(String, ResourceError)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                self.read_entry(entry)
                    .err()
                    .map(|err| (entry.path.clone(), err))
            })
            .collect()
    }

    /// Writes every file below `dir`. Returns the number of files written.
    pub fn extract_to(&self, dir: impl AsRef<Path>) -> ResourceResult<usize> {
        let dir = dir.as_ref();
        let mut written = 0;
        for path in self.file_list() {
            if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
                return Err(ResourceError::invalid_format(
                    &self.source,
                    format!("entry '{path}' escapes the extraction directory"),
                ));
            }

            let bytes = self.get_data(&path)?;
            let target = dir.join(&path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ResourceError::io(parent, e))?;
            }
            fs::write(&target, bytes).map_err(|e| ResourceError::io(&target, e))?;
            written += 1;
        }
        Ok(written)
    }
}

impl Default for BundleContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BundleContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleContainer")
            .field("source", &self.source)
            .field("header", &self.header)
            .field("files", &self.file_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgk_core::ErrorKind;

    fn sample() -> BundleContainer {
        let mut bundle = BundleContainer::new();
        bundle.add_data("ui/logo.png", vec![0u8; 300]).unwrap();
        bundle.add_data("shaders\\blit.wgsl", b"fn main() {}".to_vec()).unwrap();
        bundle.add_data("empty.bin", Vec::new()).unwrap();
        bundle
    }

    #[test]
    fn staged_files_are_visible_before_saving() {
        let mut bundle = sample();
        assert!(bundle.contains("shaders/blit.wgsl"));
        assert_eq!(bundle.file_count(), 3);
        assert_eq!(bundle.get_data("./ui/logo.png").unwrap().len(), 300);
        assert!(bundle.entry("ui/logo.png").is_none());
        assert!(bundle.add_data("./", vec![1]).is_err());
    }

    #[test]
    fn round_trips_through_bytes() {
        for compress in [false, true] {
            let image = sample().to_bytes(compress).unwrap();
            let bundle = BundleContainer::from_bytes(image, "mem").unwrap();

            assert_eq!(bundle.header().unwrap().is_compressed(), compress);
            assert_eq!(
                bundle.file_list(),
                vec!["ui/logo.png", "shaders/blit.wgsl", "empty.bin"]
            );
            assert_eq!(bundle.get_data("ui/logo.png").unwrap(), vec![0u8; 300]);
            assert_eq!(bundle.get_data("shaders/blit.wgsl").unwrap(), b"fn main() {}");
            assert!(bundle.get_data("empty.bin").unwrap().is_empty());
            assert!(bundle.verify().is_empty());
        }
    }

    #[test]
    fn compression_only_kept_when_smaller() {
        let image = sample().to_bytes(true).unwrap();
        let bundle = BundleContainer::from_bytes(image, "mem").unwrap();

        let logo = bundle.entry("ui/logo.png").unwrap();
        assert!(logo.compressed);
        assert_eq!(logo.original_size, 300);
        assert_eq!(logo.size, 4);

        let shader = bundle.entry("shaders/blit.wgsl").unwrap();
        assert!(!shader.compressed);
        assert_eq!(shader.size, shader.original_size);
    }

    #[test]
    fn corrupted_entry_fails_alone() {
        let mut image = sample().to_bytes(false).unwrap();
        let probe = BundleContainer::from_bytes(image.clone(), "mem").unwrap();
        let data_offset = probe.header().unwrap().data_offset as usize;
        let shader = probe.entry("shaders/blit.wgsl").unwrap().clone();

        image[data_offset + shader.offset as usize] ^= 0xff;
        let bundle = BundleContainer::from_bytes(image, "mem").unwrap();

        let err = bundle.get_data("shaders/blit.wgsl").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
        assert!(bundle.get_data("ui/logo.png").is_ok());

        let failures = bundle.verify();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "shaders/blit.wgsl");
    }

    #[test]
    fn missing_entries_are_not_found() {
        let bundle = BundleContainer::from_bytes(sample().to_bytes(false).unwrap(), "mem").unwrap();
        let err = bundle.get_data("nope.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(!bundle.contains("nope.png"));
    }

    #[test]
    fn restaging_a_read_entry_overrides_it() {
        let mut bundle =
            BundleContainer::from_bytes(sample().to_bytes(true).unwrap(), "mem").unwrap();
        bundle.add_data("empty.bin", b"filled".to_vec()).unwrap();
        bundle.add_data("new.txt", b"new".to_vec()).unwrap();
        assert_eq!(bundle.file_count(), 4);

        let resaved = BundleContainer::from_bytes(bundle.to_bytes(false).unwrap(), "mem").unwrap();
        assert_eq!(resaved.get_data("empty.bin").unwrap(), b"filled");
        assert_eq!(resaved.get_data("new.txt").unwrap(), b"new");
        assert_eq!(resaved.file_count(), 4);
    }

    #[test]
    fn rejects_truncated_images() {
        let image = sample().to_bytes(false).unwrap();
        let err = BundleContainer::from_bytes(image[..image.len() - 1].to_vec(), "mem").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);

        let err = BundleContainer::from_bytes(b"KGK".to_vec(), "mem").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }
}
