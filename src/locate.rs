use std::fs;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

use rarc::header::MAGIC;

use crate::error::Error;

/// Find the backup container: `path` itself when it is a file, otherwise the largest file
/// in the directory over `min_size` that starts with the backup magic.
///
/// The backup tool names the container after a hash with no extension, so this sniffs
/// content instead of names.
pub fn find_backup(path: &Path, min_size: u64) -> Result<PathBuf, Error> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let mut best: Option<(PathBuf, u64)> = None;
    for entry in fs::read_dir(path).map_err(Error::at(path))? {
        let entry = entry.map_err(Error::at(path))?;
        let candidate = entry.path();

        let len = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => continue,
        };
        if len <= min_size {
            continue;
        }

        match has_magic(&candidate) {
            Ok(true) => (),
            Ok(false) => continue,
            Err(e) => {
                debug!("Skipping {}: {}", candidate.display(), e);
                continue;
            }
        }

        if best.as_ref().map_or(true, |(_, best_len)| len > *best_len) {
            best = Some((candidate, len));
        }
    }

    best.map(|(p, _)| p).ok_or_else(|| Error::NoBackupFound {
        dir: path.to_path_buf(),
    })
}

fn has_magic(path: &Path) -> std::io::Result<bool> {
    let mut head = Vec::with_capacity(MAGIC.len());
    File::open(path)?
        .take(MAGIC.len() as u64)
        .read_to_end(&mut head)?;
    Ok(head == MAGIC)
}
