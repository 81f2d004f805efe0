//! Forward only iteration over the archive entries of a container body.
//!
//! The framing itself is plain tar and is handled by the `tar` crate, this layer owns the
//! iteration contract on top of it:
//! - entries come out strictly in stream order, nothing is ever seeked or replayed
//! - an entry borrows the iterator, so it is gone before the next one can be requested;
//!   whatever payload was left unread is skipped when the next entry is pulled
//! - [`Entries::stop_early`] ends the scan without touching the rest of the stream
use std::borrow::Cow;
use std::io::Read;

use crate::error::ArchiveError;

pub struct Scanner<R: Read> {
    archive: tar::Archive<R>,
}

impl<R: Read> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Scanner {
            archive: tar::Archive::new(reader),
        }
    }

    /// The entry sequence, can only be taken once per scanner.
    pub fn entries(&mut self) -> Result<Entries<'_, R>, ArchiveError> {
        Ok(Entries {
            inner: self.archive.entries()?,
            current: None,
            scanned: 0,
            next_offset: 0,
            stopped: false,
        })
    }
}

pub struct Entries<'a, R: 'a + Read> {
    inner: tar::Entries<'a, R>,
    current: Option<tar::Entry<'a, R>>,
    scanned: u64,
    // Byte offset just past the last entry handed out, for error reporting
    next_offset: u64,
    stopped: bool,
}

impl<'a, R: 'a + Read> Entries<'a, R> {
    pub fn next_entry(&mut self) -> Option<Result<ArchiveEntry<'_, 'a, R>, ArchiveError>> {
        // Release the previous entry, tar skips over its unread payload on the next pull
        self.current = None;

        if self.stopped {
            return None;
        }

        let entry = match self.inner.next() {
            None => {
                self.stopped = true;
                return None;
            }
            Some(Err(source)) => {
                self.stopped = true;
                return Some(Err(ArchiveError::Entry {
                    index: self.scanned,
                    offset: self.next_offset,
                    source,
                }));
            }
            Some(Ok(entry)) => entry,
        };

        let index = self.scanned;
        self.scanned += 1;

        let name = match String::from_utf8_lossy(&entry.path_bytes()) {
            Cow::Borrowed(name) => name.to_string(),
            Cow::Owned(name) => name,
        };
        let size = entry.size();
        let offset = entry.raw_header_position();
        let is_file = entry.header().entry_type().is_file();
        self.next_offset = entry.raw_file_position() + size;

        let payload = self.current.insert(entry);
        Some(Ok(ArchiveEntry {
            index,
            name,
            size,
            offset,
            is_file,
            payload,
        }))
    }

    /// No further entries are pulled from the stream once this is called.
    pub fn stop_early(&mut self) {
        self.current = None;
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Count of entries handed out so far.
    pub fn scanned(&self) -> u64 {
        self.scanned
    }
}

/// One archive entry, its payload can be read as a stream until the next entry is pulled.
pub struct ArchiveEntry<'e, 'a, R: 'a + Read> {
    index: u64,
    name: String,
    size: u64,
    offset: u64,
    is_file: bool,
    payload: &'e mut tar::Entry<'a, R>,
}

impl<'a, R: 'a + Read> ArchiveEntry<'_, 'a, R> {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Byte offset of the entry header within the archive stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }
}

impl<'a, R: 'a + Read> Read for ArchiveEntry<'_, 'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.payload.read(buf)
    }
}

#[cfg(test)]
mod test_scanner {
    use super::*;
    use crate::test_util::{build_tar, entry_offset, Counting};
    use std::io::Cursor;

    fn sample(count: usize, size: usize) -> Vec<(String, Vec<u8>)> {
        (0..count)
            .map(|i| (format!("apps/pkg/{}.bin", i), vec![i as u8; size]))
            .collect()
    }

    #[test]
    fn entries_in_stream_order() {
        let entries = vec![
            ("a.txt".to_string(), b"alpha".to_vec()),
            ("dir/b.txt".to_string(), b"".to_vec()),
            ("dir/c.bin".to_string(), vec![3u8; 1500]),
        ];
        let mut scanner = Scanner::new(Cursor::new(build_tar(&entries)));
        let mut iter = scanner.entries().unwrap();

        let mut seen = Vec::new();
        while let Some(entry) = iter.next_entry() {
            let mut entry = entry.unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();

            assert!(entry.is_file());
            assert_eq!(entry.size(), data.len() as u64);
            seen.push((entry.index(), entry.name().to_string(), data));
        }

        assert_eq!(
            seen,
            vec![
                (0, "a.txt".to_string(), b"alpha".to_vec()),
                (1, "dir/b.txt".to_string(), b"".to_vec()),
                (2, "dir/c.bin".to_string(), vec![3u8; 1500]),
            ]
        );
        assert_eq!(iter.scanned(), 3);
        assert!(iter.is_stopped());
    }

    #[test]
    fn unread_payload_does_not_corrupt_next_entries() {
        let entries = sample(6, 2000);
        let mut scanner = Scanner::new(Cursor::new(build_tar(&entries)));
        let mut iter = scanner.entries().unwrap();

        let mut idx = 0;
        while let Some(entry) = iter.next_entry() {
            let mut entry = entry.unwrap();
            assert_eq!(entry.name(), entries[idx].0);
            assert_eq!(entry.size(), 2000);

            match idx % 3 {
                // Untouched
                0 => (),
                // Partially read
                1 => {
                    let mut buf = [0u8; 700];
                    entry.read_exact(&mut buf).unwrap();
                    assert_eq!(buf, [idx as u8; 700]);
                }
                // Fully read
                _ => {
                    let mut data = Vec::new();
                    entry.read_to_end(&mut data).unwrap();
                    assert_eq!(data, entries[idx].1);
                }
            }
            idx += 1;
        }
        assert_eq!(idx, 6);
    }

    #[test]
    fn early_stop_reads_nothing_past_last_target() {
        let entries = sample(10, 1000);
        let tar = build_tar(&entries);

        let (reader, read) = Counting::new(Cursor::new(tar));
        let mut scanner = Scanner::new(reader);
        let mut iter = scanner.entries().unwrap();

        while let Some(entry) = iter.next_entry() {
            let found = {
                let mut entry = entry.unwrap();
                let found = entry.name().ends_with("/3.bin");
                if found {
                    let mut data = Vec::new();
                    entry.read_to_end(&mut data).unwrap();
                    assert_eq!(data, vec![3u8; 1000]);
                }
                found
            };

            if found {
                iter.stop_early();
            }
        }

        let after_stop = read.get();
        assert_eq!(iter.scanned(), 4);
        assert!(after_stop <= entry_offset(&entries, 4));

        // Stopped scanners stay stopped
        assert!(iter.next_entry().is_none());
        assert_eq!(read.get(), after_stop);
    }

    #[test]
    fn entries_are_not_restartable() {
        let mut scanner = Scanner::new(Cursor::new(build_tar(&sample(2, 10))));
        {
            let mut iter = scanner.entries().unwrap();
            assert!(iter.next_entry().is_some());
        }
        assert!(scanner.entries().is_err());
    }

    #[test]
    fn truncated_stream_reports_position() {
        let entries = sample(3, 1000);
        let mut tar = build_tar(&entries);
        // Cut into the middle of the third header
        tar.truncate(entry_offset(&entries, 2) as usize + 100);

        let mut scanner = Scanner::new(Cursor::new(tar));
        let mut iter = scanner.entries().unwrap();

        assert!(iter.next_entry().unwrap().is_ok());
        assert!(iter.next_entry().unwrap().is_ok());

        match iter.next_entry() {
            Some(Err(ArchiveError::Entry { index, offset, .. })) => {
                assert_eq!(index, 2);
                assert_eq!(offset, 512 + 1024 + 512 + 1000);
            }
            Some(Err(e)) => panic!("unexpected error: {}", e),
            Some(Ok(_)) => panic!("truncated entry was returned"),
            None => panic!("truncation went unnoticed"),
        }
        assert!(iter.next_entry().is_none());
    }
}
