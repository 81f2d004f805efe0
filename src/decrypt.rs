//! Password search against the encrypted database.
//!
//! Candidates are tried strictly in order through a small state machine:
//!
//! ```text
//! Select -> Apply -> Validate -> Export -> Done
//!   ^                   |
//!   +----- Reject <-----+            Select -> Exhausted
//! ```
//!
//! At most one session is open at any time, a rejected candidate has its session closed
//! before the next one is applied.
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::Error;
use crate::key::Candidate;
use crate::sql::{CipherEngine, CipherParams, CipherSession, EngineError, WECHAT_CIPHER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(PathBuf),
    WrongKey,
    IoError(String),
}

impl From<EngineError> for Outcome {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::WrongKey => Outcome::WrongKey,
            EngineError::Failure(msg) => Outcome::IoError(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attempt {
    pub candidate: Candidate,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub struct Decrypted {
    pub path: PathBuf,
    pub candidate: Candidate,
    pub attempts: Vec<Attempt>,
}

enum State<S> {
    Select,
    Apply(Candidate),
    Validate(Candidate, S),
    Reject(Candidate, Option<S>, Outcome),
    Export(Candidate, S),
    Done(Candidate, PathBuf),
    Exhausted,
}

pub struct Decryptor<'e, E: CipherEngine> {
    engine: &'e E,
    params: CipherParams,
}

impl<'e, E: CipherEngine> Decryptor<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Decryptor {
            engine,
            params: WECHAT_CIPHER,
        }
    }

    /// Try every candidate against `db` until one opens it, then export it to `output`.
    pub fn decrypt(
        &self,
        db: &Path,
        candidates: Vec<Candidate>,
        output: &Path,
    ) -> Result<Decrypted, Error> {
        if !db.is_file() {
            return Err(Error::Io {
                path: db.to_path_buf(),
                source: std::io::ErrorKind::NotFound.into(),
            });
        }

        let total = candidates.len();
        let mut queue = candidates.into_iter();
        let mut attempts: Vec<Attempt> = Vec::with_capacity(total);
        let mut state = State::Select;

        loop {
            state = match state {
                State::Select => match queue.next() {
                    Some(candidate) => State::Apply(candidate),
                    None => State::Exhausted,
                },

                State::Apply(candidate) => {
                    info!(
                        "Trying candidate {}/{}: token={} password={}",
                        attempts.len() + 1,
                        total,
                        candidate.device_token,
                        candidate.password
                    );
                    match self.engine.open(db, &candidate.password, &self.params) {
                        Ok(session) => State::Validate(candidate, session),
                        Err(e) => State::Reject(candidate, None, e.into()),
                    }
                }

                State::Validate(candidate, session) => match session.object_count() {
                    Ok(count) if count > 0 => {
                        info!("Found {} database objects", count);
                        State::Export(candidate, session)
                    }
                    Ok(count) => {
                        debug!("Catalog has {} objects, treating as wrong key", count);
                        State::Reject(candidate, Some(session), Outcome::WrongKey)
                    }
                    Err(e) => State::Reject(candidate, Some(session), e.into()),
                },

                State::Reject(candidate, session, outcome) => {
                    if let Some(session) = session {
                        if let Err(e) = session.close() {
                            warn!("Closing rejected session: {}", e);
                        }
                    }
                    match &outcome {
                        Outcome::IoError(msg) => {
                            warn!("Candidate {} failed: {}", attempts.len() + 1, msg)
                        }
                        _ => warn!(
                            "Candidate {} (token {}) rejected",
                            attempts.len() + 1,
                            candidate.device_token
                        ),
                    }

                    attempts.push(Attempt { candidate, outcome });
                    State::Select
                }

                State::Export(candidate, session) => {
                    let path = export(session, output, attempts.len() + 1, &candidate)?;
                    attempts.push(Attempt {
                        candidate: candidate.clone(),
                        outcome: Outcome::Success(path.clone()),
                    });
                    State::Done(candidate, path)
                }

                State::Done(candidate, path) => {
                    info!("Decrypted {} to {}", db.display(), path.display());
                    return Ok(Decrypted {
                        path,
                        candidate,
                        attempts,
                    });
                }

                State::Exhausted => {
                    return Err(Error::PasswordExhausted {
                        tried: attempts.len(),
                        db: db.to_path_buf(),
                    })
                }
            }
        }
    }
}

// Export into a temporary sibling then move it over `output`, replacing any old file
fn export<S: CipherSession>(
    session: S,
    output: &Path,
    index: usize,
    candidate: &Candidate,
) -> Result<PathBuf, Error> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(Error::at(parent))?;

    let tmp = tempfile::Builder::new()
        .prefix(".export-")
        .suffix(".db")
        .tempfile_in(parent)
        .map_err(Error::at(parent))?
        .into_temp_path();

    // Always close, even when the export itself failed
    let exported = session.export_plaintext(&tmp);
    let closed = session.close();
    exported.and(closed).map_err(|e| Error::Export {
        path: output.to_path_buf(),
        candidate: index,
        token: candidate.device_token.clone(),
        message: e.to_string(),
    })?;

    tmp.persist(output).map_err(|e| Error::Io {
        path: output.to_path_buf(),
        source: e.error,
    })?;
    Ok(output.to_path_buf())
}

/// `<dir>/<stem>_decrypted.db` next to the encrypted database.
pub fn default_output(db: &Path) -> PathBuf {
    let stem = db
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "database".to_string());
    db.with_file_name(format!("{}_decrypted.db", stem))
}
