//! Android backup preamble
//!
//! A backup container starts with four `\n` terminated ASCII lines, the archive stream
//! follows right after the last newline:
//!
//! | Line | Content |
//! | ---: | ------- |
//! | 1    | `ANDROID BACKUP` |
//! | 2    | format version, decimal |
//! | 3    | `1` if the archive stream is zlib compressed, `0` otherwise |
//! | 4    | `none` or `AES-256` |
//!
//! The reader pulls one byte at a time so the stream is left exactly after the fourth
//! newline, nothing past the header is buffered.
use std::fmt;
use std::io::Read;

use crate::error::ArchiveError;

pub const MAGIC: &[u8] = b"ANDROID BACKUP";

// Longest line we are willing to look at before giving up on the header
const MAX_LINE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    None,
    Aes256,
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encryption::None => write!(f, "none"),
            Encryption::Aes256 => write!(f, "AES-256"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHeader {
    pub version: u32,
    pub compressed: bool,
    pub encryption: Encryption,
}

struct LineReader<'r, R: Read> {
    inner: &'r mut R,
    offset: u64,
}

impl<R: Read> LineReader<'_, R> {
    // Returns the line without its terminator along with the offset it started at
    fn line(&mut self, what: &str) -> Result<(u64, Vec<u8>), ArchiveError> {
        let start = self.offset;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            let len = match self.inner.read(&mut byte) {
                Ok(len) => len,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if len == 0 {
                return Err(malformed(
                    self.offset,
                    format!("end of stream inside {} line", what),
                ));
            }
            self.offset += 1;

            if byte[0] == b'\n' {
                return Ok((start, line));
            }
            if line.len() == MAX_LINE {
                return Err(malformed(start, format!("{} line is too long", what)));
            }
            line.push(byte[0]);
        }
    }
}

fn malformed(offset: u64, reason: String) -> ArchiveError {
    ArchiveError::MalformedHeader { offset, reason }
}

/// Validate and consume the backup preamble.
///
/// AES-256 is accepted here as a recognised value, rejecting it is up to the caller.
pub fn read_header<R: Read>(reader: &mut R) -> Result<BackupHeader, ArchiveError> {
    let mut lines = LineReader {
        inner: reader,
        offset: 0,
    };

    let (offset, magic) = lines.line("magic")?;
    if magic != MAGIC {
        return Err(malformed(
            offset,
            format!("bad magic {:?}", String::from_utf8_lossy(&magic)),
        ));
    }

    let (offset, version) = lines.line("version")?;
    let version = std::str::from_utf8(&version)
        .ok()
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| {
            malformed(
                offset,
                format!("bad version {:?}", String::from_utf8_lossy(&version)),
            )
        })?;

    let (offset, compressed) = lines.line("compression")?;
    let compressed = match &compressed[..] {
        b"0" => false,
        b"1" => true,
        x => {
            return Err(malformed(
                offset,
                format!("bad compression flag {:?}", String::from_utf8_lossy(x)),
            ))
        }
    };

    let (offset, encryption) = lines.line("encryption")?;
    let encryption = match &encryption[..] {
        b"none" => Encryption::None,
        b"AES-256" => Encryption::Aes256,
        x => {
            return Err(malformed(
                offset,
                format!("bad encryption mode {:?}", String::from_utf8_lossy(x)),
            ))
        }
    };

    Ok(BackupHeader {
        version,
        compressed,
        encryption,
    })
}

#[cfg(test)]
mod test_read_header {
    use super::*;
    use std::io::Cursor;

    fn parse(data: &[u8]) -> (Result<BackupHeader, ArchiveError>, u64) {
        let mut cursor = Cursor::new(data.to_vec());
        let header = read_header(&mut cursor);
        (header, cursor.position())
    }

    fn malformed_offset(data: &[u8]) -> u64 {
        match parse(data).0 {
            Err(ArchiveError::MalformedHeader { offset, .. }) => offset,
            x => panic!("expected MalformedHeader, got {:?}", x),
        }
    }

    #[test]
    fn valid_header_leaves_cursor_after_fourth_newline() {
        let preamble = b"ANDROID BACKUP\n5\n0\nnone\n";
        let mut data = preamble.to_vec();
        data.extend_from_slice(b"\nnone\ntrailing tar bytes");

        let (header, pos) = parse(&data);

        assert_eq!(
            header.unwrap(),
            BackupHeader {
                version: 5,
                compressed: false,
                encryption: Encryption::None,
            }
        );
        assert_eq!(pos, preamble.len() as u64);
    }

    #[test]
    fn compressed_and_aes_are_recognised() {
        let (header, _) = parse(b"ANDROID BACKUP\n1\n1\nAES-256\n");
        let header = header.unwrap();

        assert!(header.compressed);
        assert_eq!(header.encryption, Encryption::Aes256);
    }

    #[test]
    fn bad_magic() {
        assert_eq!(malformed_offset(b"ANDROID BACKUQ\n5\n0\nnone\n"), 0);
        assert_eq!(malformed_offset(b"android backup\n5\n0\nnone\n"), 0);
        assert_eq!(malformed_offset(b"ANDROID BACKUP \n5\n0\nnone\n"), 0);
        assert_eq!(malformed_offset(b"ANDROID BACKUP\r\n5\n0\nnone\n"), 0);
        assert_eq!(malformed_offset(b"\n"), 0);
        assert_eq!(malformed_offset(b"PK\x03\x04\nnot a backup at all"), 0);
    }

    #[test]
    fn bad_version() {
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n-1\n0\nnone\n"), 15);
        assert_eq!(malformed_offset(b"ANDROID BACKUP\nfive\n0\nnone\n"), 15);
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n\n0\nnone\n"), 15);
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n5\r\n0\nnone\n"), 15);
    }

    #[test]
    fn bad_compression_flag() {
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n5\n2\nnone\n"), 17);
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n5\ntrue\nnone\n"), 17);
    }

    #[test]
    fn bad_encryption_mode() {
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n5\n0\nNONE\n"), 19);
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n5\n0\naes-256\n"), 19);
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n5\n0\nnone\r\n"), 19);
    }

    #[test]
    fn truncated_header() {
        assert_eq!(malformed_offset(b"ANDROID BACKUP\n5\n0\nnone"), 23);
        assert_eq!(malformed_offset(b""), 0);
    }

    #[test]
    fn endless_line_is_rejected() {
        let data = vec![b'A'; 4096];
        let (header, pos) = parse(&data);

        assert!(matches!(header, Err(ArchiveError::MalformedHeader { .. })));
        assert!(pos <= (MAX_LINE + 1) as u64);
    }
}
