/// File overwrite and removal primitives shared by the destroyers
use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::error::DestructionError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Content written by a single overwrite pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Random,
    Byte(u8),
}

/// Totals for one overwrite run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WipeStats {
    pub passes: u32,
    pub bytes_written: u64,
}

/// Pass plan for `secure-wipe`: fixed patterns in rotation, random last pass
pub fn secure_patterns(passes: u32) -> Vec<Pattern> {
    const CYCLE: [Pattern; 5] = [
        Pattern::Random,
        Pattern::Byte(0x00),
        Pattern::Byte(0xFF),
        Pattern::Byte(0x55),
        Pattern::Byte(0xAA),
    ];

    let passes = passes as usize;
    (0..passes)
        .map(|i| if i + 1 == passes { Pattern::Random } else { CYCLE[i % CYCLE.len()] })
        .collect()
}

/// Pass plan for `fast`: random data every pass
pub fn random_patterns(passes: u32) -> Vec<Pattern> {
    vec![Pattern::Random; passes as usize]
}

/// Overwrite the first `len` bytes of `file` once per pattern.
///
/// `after_pass` runs after every complete pass (used to fsync real files).
pub fn overwrite<F, S>(file: &mut F, len: u64, patterns: &[Pattern], mut after_pass: S) -> io::Result<WipeStats>
where
    F: Write + Seek,
    S: FnMut(&mut F) -> io::Result<()>,
{
    let mut stats = WipeStats::default();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut rng = rand::rng();

    for pattern in patterns {
        if let Pattern::Byte(byte) = pattern {
            buffer.fill(*byte);
        }

        file.seek(SeekFrom::Start(0))?;
        let mut remaining = len;
        while remaining > 0 {
            let write_size = remaining.min(CHUNK_SIZE as u64) as usize;
            if *pattern == Pattern::Random {
                rng.fill_bytes(&mut buffer[..write_size]);
            }
            file.write_all(&buffer[..write_size])?;
            remaining -= write_size as u64;
        }

        file.flush()?;
        after_pass(file)?;

        stats.passes += 1;
        stats.bytes_written += len;
    }

    Ok(stats)
}

/// Overwrite a regular file in place, syncing after every pass
pub fn overwrite_file(path: &Path, patterns: &[Pattern]) -> Result<WipeStats, DestructionError> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| DestructionError::io("open", path, e))?;

    let len = file
        .metadata()
        .map_err(|e| DestructionError::io("stat", path, e))?
        .len();

    overwrite(&mut file, len, patterns, |f| f.sync_data())
        .map_err(|e| DestructionError::io("overwrite", path, e))
}

/// Unlink a file without touching its content
pub fn unlink(path: &Path) -> Result<(), DestructionError> {
    fs::remove_file(path).map_err(|e| DestructionError::io("remove", path, e))
}

/// Rename to a random sibling name, then unlink, so the original name is not
/// left in the directory entry. Falls back to a plain unlink.
pub fn scrub_and_unlink(path: &Path) -> Result<(), DestructionError> {
    let scrubbed = scrubbed_name(path);
    match fs::rename(path, &scrubbed) {
        Ok(()) => unlink(&scrubbed),
        Err(e) => {
            log::debug!("Rename before unlink failed for {}: {}", path.display(), e);
            unlink(path)
        }
    }
}

fn scrubbed_name(path: &Path) -> PathBuf {
    path.with_file_name(hex::encode(rand::random::<[u8; 8]>()))
}
