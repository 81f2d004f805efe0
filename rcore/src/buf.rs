use std::io::{Read, Write};

// 1Mb copy buffer, large payloads are streamed through this and never held whole
pub const COPY_BUF_SIZE: usize = 1024 * 1024;

pub fn fill_buf<R: Read>(data: &mut R, buf: &mut [u8]) -> std::io::Result<(bool, usize)> {
    let mut buf_read = 0;

    while buf_read < buf.len() {
        match data.read(&mut buf[buf_read..]) {
            Ok(0) => return Ok((true, buf_read)),
            Ok(x) => buf_read += x,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
    }
    Ok((false, buf_read))
}

/// Stream everything from `reader` into `writer` through one fixed size heap buffer.
///
/// Returns the number of bytes written.
pub fn copy_buffered<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buf_size: usize,
) -> std::io::Result<u64> {
    let mut in_buf = vec![0u8; buf_size.max(1)].into_boxed_slice();
    let mut written: u64 = 0;

    loop {
        match fill_buf(reader, &mut in_buf)? {
            (true, 0) => break,
            (eof, len) => {
                writer.write_all(&in_buf[..len])?;
                written += len as u64;

                if eof {
                    break;
                }
            }
        }
    }
    writer.flush()?;
    Ok(written)
}

/// Read at most `limit` bytes into memory, for small payloads only.
pub fn read_capped<R: Read>(reader: &mut R, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.take(limit).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod test_fill_buf {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn big_buf_small_vec() {
        let mut in_buf: Cursor<Vec<u8>> = Cursor::new(vec![1, 2]);
        let mut buf: [u8; 4] = [0; 4];

        assert_eq!(fill_buf(&mut in_buf, &mut buf).unwrap(), (true, 2));
        assert_eq!(&buf, &[1, 2, 0, 0]);
    }

    #[test]
    fn small_buf_big_vec() {
        let mut in_buf: Cursor<Vec<u8>> = Cursor::new(vec![1, 2, 3, 4]);
        let mut buf: [u8; 2] = [0; 2];

        assert_eq!(fill_buf(&mut in_buf, &mut buf).unwrap(), (false, 2));
        assert_eq!(&buf, &[1, 2]);
    }
}
