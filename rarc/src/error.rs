use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("malformed backup header at byte {offset}: {reason}")]
    MalformedHeader { offset: u64, reason: String },

    #[error("backup container uses {0} encryption, only unencrypted containers are supported")]
    UnsupportedEncryption(String),

    #[error("required target `{target}` not found after scanning {scanned} entries")]
    TargetNotFound { target: String, scanned: u64 },

    #[error("archive entry #{index} (header at byte {offset}) unreadable: {source}")]
    Entry {
        index: u64,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("entry `{name}` would escape the output directory")]
    UnsafePath { name: String },

    #[error("{}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl ArchiveError {
    pub(crate) fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ArchiveError {
        let path = path.into();
        move |source| ArchiveError::Path { path, source }
    }
}
