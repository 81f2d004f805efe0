use std::path::Path;

use rusqlite::{Connection, ErrorCode, OpenFlags};
use thiserror::Error;

/// Page cipher settings handed to the engine along with the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherParams {
    pub compatibility: u32,
    pub use_hmac: bool,
    pub page_size: u32,
    pub kdf_iter: u32,
}

// Must match what the app writes its databases with (SQLCipher 1.x/2.x layout)
pub const WECHAT_CIPHER: CipherParams = CipherParams {
    compatibility: 2,
    use_hmac: false,
    page_size: 1024,
    kdf_iter: 4000,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("wrong key or not a database")]
    WrongKey,
    #[error("{0}")]
    Failure(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::NotADatabase => {
                EngineError::WrongKey
            }
            e => EngineError::Failure(e.to_string()),
        }
    }
}

/// Something that can open a page encrypted database with a given key.
pub trait CipherEngine {
    type Session: CipherSession;

    fn open(
        &self,
        db: &Path,
        password: &str,
        params: &CipherParams,
    ) -> Result<Self::Session, EngineError>;
}

/// One open handle on an encrypted database.
pub trait CipherSession {
    /// Number of rows in the schema catalog, only readable with the right key
    fn object_count(&self) -> Result<i64, EngineError>;

    /// Copy schema and data into a fresh unencrypted database at `dest`
    fn export_plaintext(&self, dest: &Path) -> Result<(), EngineError>;

    fn close(self) -> Result<(), EngineError>;
}

/// SQLCipher through the bundled rusqlite build.
pub struct SqlCipher;

pub struct SqlCipherSession {
    conn: Connection,
}

impl CipherEngine for SqlCipher {
    type Session = SqlCipherSession;

    fn open(
        &self,
        db: &Path,
        password: &str,
        params: &CipherParams,
    ) -> Result<SqlCipherSession, EngineError> {
        // A missing database must not be conjured up. CREATE stays on so the
        // export can ATTACH a file that does not exist yet.
        if !db.is_file() {
            return Err(EngineError::Failure(format!(
                "unable to open database file: {}",
                db.display()
            )));
        }
        let conn = Connection::open_with_flags(
            db,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // Values are bound as quoted literals, never spliced in as raw sql
        conn.pragma_update(None, "key", password)?;
        conn.pragma_update(None, "cipher_compatibility", params.compatibility)?;
        conn.pragma_update(None, "cipher_use_hmac", params.use_hmac)?;
        conn.pragma_update(None, "cipher_page_size", params.page_size)?;
        conn.pragma_update(None, "kdf_iter", params.kdf_iter)?;

        Ok(SqlCipherSession { conn })
    }
}

impl CipherSession for SqlCipherSession {
    fn object_count(&self) -> Result<i64, EngineError> {
        Ok(self
            .conn
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))?)
    }

    fn export_plaintext(&self, dest: &Path) -> Result<(), EngineError> {
        let dest = dest.to_str().ok_or_else(|| {
            EngineError::Failure(format!("non utf-8 path: {}", dest.display()))
        })?;

        self.conn
            .execute("ATTACH DATABASE ?1 AS plaintext KEY ''", [dest])?;
        let exported = self
            .conn
            .query_row("SELECT sqlcipher_export('plaintext')", [], |_| Ok(()));
        let detached = self.conn.execute_batch("DETACH DATABASE plaintext;");

        exported?;
        detached?;
        Ok(())
    }

    fn close(self) -> Result<(), EngineError> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}
