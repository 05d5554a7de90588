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

use crate::helpers::*;
use anyhow::{bail, Context, Result};
use kgk_core::ResourceError;
use kgk_io::BundleContainer;
use std::path::Path;

fn open(path: &Path) -> Result<BundleContainer> {
    let bundle = BundleContainer::open(path)
        .with_context(|| format!("Failed to open bundle '{}'", path.display()))?;
    log::debug!("Opened '{}' ({} entries)", path.display(), bundle.file_count());
    Ok(bundle)
}

pub fn list(path: &Path) -> Result<()> {
    print_task_start("Bundle Contents", MAGNIFIER, CYAN);
    let bundle = open(path)?;

    if let Some(header) = bundle.header() {
        println!(
            "{}{}{} v{} · {} entries · {} · compressed={}",
            BOLD,
            path.display(),
            RESET,
            header.version,
            header.file_count,
            human_size(header.total_size),
            header.is_compressed()
        );
    }
    println!(
        "{}{:<48} {:>10} {:>10} {:>5} {:>10}{}",
        BOLD, "path", "stored", "original", "rle", "crc32", RESET
    );
    for entry in bundle.entries() {
        println!(
            "{:<48} {:>10} {:>10} {:>5} {:>10}",
            entry.path,
            entry.size,
            entry.original_size,
            if entry.compressed { "yes" } else { "no" },
            format!("{:08x}", entry.checksum)
        );
    }
    Ok(())
}

/// Checks every entry's checksum, returning the failures.
pub fn verify_bundle(path: &Path) -> Result<Vec<(String, ResourceError)>> {
    Ok(open(path)?.verify())
}

pub fn verify(path: &Path) -> Result<()> {
    print_task_start("Verifying Bundle", SHIELD, YELLOW);
    let failures = verify_bundle(path)?;
    if failures.is_empty() {
        print_success(&format!("'{}' is intact", path.display()));
        return Ok(());
    }
    for (entry, error) in &failures {
        log::debug!("Entry '{}' failed: {:?}", entry, error);
        print_error(&format!("{entry}: {error}"));
    }
    bail!("{} entries failed verification", failures.len());
}

pub fn extract(path: &Path, dest: &Path) -> Result<()> {
    print_task_start("Extracting Bundle", OPEN_BOX, GREEN);
    let count = open(path)?
        .extract_to(dest)
        .with_context(|| format!("Failed to extract into '{}'", dest.display()))?;
    print_success(&format!("Extracted {} files into '{}'", count, dest.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn verify_reports_only_damaged_entries() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pack.kgkb");
        let mut bundle = BundleContainer::new();
        bundle.add_data("a.bin", vec![1u8; 32])?;
        bundle.add_data("b.bin", vec![2u8, 3, 4, 5])?;
        let header = bundle.save(&path, false)?;
        assert!(verify_bundle(&path)?.is_empty());

        let mut bytes = fs::read(&path)?;
        let last = header.total_size as usize - 1;
        bytes[last] ^= 0x01;
        fs::write(&path, bytes)?;

        let failures = verify_bundle(&path)?;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b.bin");
        assert!(verify(&path).is_err());
        Ok(())
    }

    #[test]
    fn extract_writes_every_entry() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pack.kgkb");
        let mut bundle = BundleContainer::new();
        bundle.add_data("docs/readme.txt", b"read me".to_vec())?;
        bundle.save(&path, true)?;

        extract(&path, &dir.path().join("out"))?;
        assert_eq!(fs::read(dir.path().join("out/docs/readme.txt"))?, b"read me");
        Ok(())
    }
}
