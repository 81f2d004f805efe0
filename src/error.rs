use std::path::PathBuf;

use thiserror::Error;

use rarc::ArchiveError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("no account identifier found in the backup ({scanned} entries scanned)")]
    MissingIdentifier { scanned: u64 },

    #[error("all {tried} password candidates failed for {}, try again with more --imei values", db.display())]
    PasswordExhausted { tried: usize, db: PathBuf },

    #[error("candidate {candidate} (token {token}) opened the database but exporting to {} failed: {message}", path.display())]
    Export {
        path: PathBuf,
        candidate: usize,
        token: String,
        message: String,
    },

    #[error("no Android backup found in {}", dir.display())]
    NoBackupFound { dir: PathBuf },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid config pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}
