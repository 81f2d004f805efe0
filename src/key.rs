//! Database password derivation.
//!
//! The password is the first 7 hex characters of `MD5(device_token || identifier)`. On
//! newer Android releases the app cannot read the real IMEI and falls back to a fixed
//! token, which is why a short default list works for most backups.
use rcore::hash::md5_hex;

pub const PASSWORD_LEN: usize = 7;

pub fn derive(identifier: &str, device_token: &str) -> String {
    let mut password = md5_hex(&[device_token.as_bytes(), identifier.as_bytes()]);
    password.truncate(PASSWORD_LEN);
    password
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub identifier: String,
    pub device_token: String,
    pub password: String,
}

impl Candidate {
    pub fn new(identifier: &str, device_token: &str) -> Self {
        Candidate {
            identifier: identifier.to_string(),
            device_token: device_token.to_string(),
            password: derive(identifier, device_token),
        }
    }
}

/// Ordered candidates: caller supplied tokens first, then the defaults.
pub fn candidates(
    identifier: &str,
    extra_tokens: &[String],
    default_tokens: &[String],
) -> Vec<Candidate> {
    extra_tokens
        .iter()
        .chain(default_tokens)
        .map(|token| Candidate::new(identifier, token))
        .collect()
}
