/// Encrypted volume header destruction
///
/// TrueCrypt and VeraCrypt keep the standard and hidden volume headers in the
/// first 128 KiB of a volume and the backup headers in the last 128 KiB.
/// Destroying those areas makes the master keys unrecoverable without touching
/// the payload.
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

use rand::RngCore;

use crate::error::DestructionError;

/// Size of each header area at the start and end of a volume
pub const HEADER_AREA: u64 = 128 * 1024;

/// Byte ranges holding header material for a volume of `size` bytes
pub fn header_regions(size: u64) -> Vec<Range<u64>> {
    let head = 0..size.min(HEADER_AREA);
    let tail_start = size.saturating_sub(HEADER_AREA).max(head.end);

    let mut regions = vec![head];
    if tail_start < size {
        regions.push(tail_start..size);
    }
    regions.retain(|r| !r.is_empty());
    regions
}

/// Overwrite the header areas of a volume file or device with random data
pub fn overwrite_headers(path: &Path) -> Result<Vec<Range<u64>>, DestructionError> {
    let mut volume = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| DestructionError::io("open volume", path, e))?;

    // Block devices report a zero metadata length; seeking to the end does not.
    let size = volume
        .seek(SeekFrom::End(0))
        .map_err(|e| DestructionError::io("size volume", path, e))?;

    let regions = header_regions(size);
    let mut rng = rand::rng();

    for region in &regions {
        let mut noise = vec![0u8; (region.end - region.start) as usize];
        rng.fill_bytes(&mut noise);

        volume
            .seek(SeekFrom::Start(region.start))
            .and_then(|_| volume.write_all(&noise))
            .map_err(|e| DestructionError::io("overwrite header", path, e))?;
    }

    volume
        .sync_all()
        .map_err(|e| DestructionError::io("sync volume", path, e))?;

    log::debug!(
        "Overwrote {} header region(s) of {} ({} bytes)",
        regions.len(),
        path.display(),
        size
    );
    Ok(regions)
}

/// Destroy a volume's headers. A volume kept in a regular file is unlinked
/// afterwards; a device node stays in place.
pub fn destroy_volume(path: &Path) -> Result<(), DestructionError> {
    let meta = fs::symlink_metadata(path).map_err(|e| DestructionError::io("stat", path, e))?;
    if meta.is_dir() || meta.file_type().is_symlink() {
        return Err(DestructionError::NotAVolume {
            path: path.to_path_buf(),
        });
    }

    overwrite_headers(path)?;

    if meta.is_file() {
        fs::remove_file(path).map_err(|e| DestructionError::io("remove", path, e))?;
    }
    Ok(())
}
