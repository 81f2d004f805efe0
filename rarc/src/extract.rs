use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

use rcore::buf::{copy_buffered, COPY_BUF_SIZE};

use crate::error::ArchiveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Stream a payload into `dest`, replacing whatever is there.
///
/// The data lands in a temporary file next to `dest` first and is renamed over it once
/// complete, an interrupted copy never leaves a truncated file at `dest`.
pub fn extract_to<R: Read>(payload: &mut R, dest: &Path) -> Result<Extracted, ArchiveError> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(ArchiveError::at(parent))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".extract-")
        .tempfile_in(parent)
        .map_err(ArchiveError::at(parent))?;

    let bytes = copy_buffered(payload, tmp.as_file_mut(), COPY_BUF_SIZE)
        .map_err(ArchiveError::at(dest))?;

    tmp.persist(dest)
        .map_err(|e| ArchiveError::at(dest)(e.error))?;
    debug!("Wrote {} bytes to {}", bytes, dest.display());

    Ok(Extracted {
        path: dest.to_path_buf(),
        bytes,
    })
}
