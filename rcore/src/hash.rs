use md5::{Digest, Md5};

/// Lowercase hex MD5 digest over the concatenation of `parts`.
pub fn md5_hex(parts: &[&[u8]]) -> String {
    let mut hash = Md5::new();
    for part in parts {
        hash.update(part);
    }
    hex::encode(hash.finalize())
}
