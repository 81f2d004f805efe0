use std::cell::Cell;
use std::io::Read;
use std::rc::Rc;

pub(crate) fn build_tar<N: AsRef<str>>(entries: &[(N, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, name.as_ref(), &data[..])
            .unwrap();
    }
    builder.into_inner().unwrap()
}

/// Byte offset of the header of entry `idx`, for names short enough to fit a plain header.
pub(crate) fn entry_offset<N>(entries: &[(N, Vec<u8>)], idx: usize) -> u64 {
    entries[..idx]
        .iter()
        .map(|(_, data)| 512 + (data.len() as u64).div_ceil(512) * 512)
        .sum()
}

pub(crate) fn container(body: Vec<u8>) -> Vec<u8> {
    let mut data = b"ANDROID BACKUP\n5\n0\nnone\n".to_vec();
    data.extend(body);
    data
}

/// Counts every byte pulled through it.
pub(crate) struct Counting<R: Read> {
    inner: R,
    read: Rc<Cell<u64>>,
}

impl<R: Read> Counting<R> {
    pub(crate) fn new(inner: R) -> (Self, Rc<Cell<u64>>) {
        let read = Rc::new(Cell::new(0));
        (
            Counting {
                inner,
                read: read.clone(),
            },
            read,
        )
    }
}

impl<R: Read> Read for Counting<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = self.inner.read(buf)?;
        self.read.set(self.read.get() + len as u64);
        Ok(len)
    }
}
