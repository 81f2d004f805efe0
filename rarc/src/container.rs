use std::io::Read;

use flate2::read::ZlibDecoder;
use log::debug;

use crate::error::ArchiveError;
use crate::header::{read_header, BackupHeader, Encryption};
use crate::scanner::Scanner;

/// The archive stream following the preamble, inflated when the header says so.
pub enum Body<R: Read> {
    Plain(R),
    Deflate(ZlibDecoder<R>),
}

impl<R: Read> Read for Body<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Body::Plain(r) => r.read(buf),
            Body::Deflate(r) => r.read(buf),
        }
    }
}

/// An opened backup container, owns the forward only stream until it is turned into a
/// [`Scanner`].
pub struct Container<R: Read> {
    header: BackupHeader,
    body: Body<R>,
}

impl<R: Read> Container<R> {
    pub fn open(mut reader: R) -> Result<Self, ArchiveError> {
        let header = read_header(&mut reader)?;
        debug!("Backup header: {:?}", header);

        if header.encryption != Encryption::None {
            return Err(ArchiveError::UnsupportedEncryption(
                header.encryption.to_string(),
            ));
        }

        let body = if header.compressed {
            Body::Deflate(ZlibDecoder::new(reader))
        } else {
            Body::Plain(reader)
        };

        Ok(Container { header, body })
    }

    pub fn header(&self) -> &BackupHeader {
        &self.header
    }

    pub fn into_scanner(self) -> Scanner<Body<R>> {
        Scanner::new(self.body)
    }
}

#[cfg(test)]
mod test_container {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn plain_body_passes_through() {
        let data = b"ANDROID BACKUP\n5\n0\nnone\nbody bytes".to_vec();
        let container = Container::open(Cursor::new(data)).unwrap();
        assert!(!container.header().compressed);

        let mut body = Vec::new();
        match container.body {
            Body::Plain(mut r) => r.read_to_end(&mut body).unwrap(),
            Body::Deflate(_) => panic!("expected a plain body"),
        };
        assert_eq!(body, b"body bytes");
    }

    #[test]
    fn compressed_body_is_inflated() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"inflated body").unwrap();

        let mut data = b"ANDROID BACKUP\n5\n1\nnone\n".to_vec();
        data.extend_from_slice(&enc.finish().unwrap());

        let mut container = Container::open(Cursor::new(data)).unwrap();
        assert!(container.header().compressed);

        let mut body = Vec::new();
        container.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"inflated body");
    }

    #[test]
    fn encrypted_container_is_refused() {
        let data = b"ANDROID BACKUP\n5\n0\nAES-256\nsalt...".to_vec();

        match Container::open(Cursor::new(data)) {
            Err(ArchiveError::UnsupportedEncryption(mode)) => assert_eq!(mode, "AES-256"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("encrypted container was accepted"),
        }
    }

    #[test]
    fn malformed_header_is_not_unsupported() {
        let data = b"NOT A BACKUP\n".to_vec();
        assert!(matches!(
            Container::open(Cursor::new(data)),
            Err(ArchiveError::MalformedHeader { .. })
        ));
    }
}
