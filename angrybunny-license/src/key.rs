//! License key generation and syntactic validation.
//!
//! Keys use the format: `AB-<16 lowercase hex>-<4 lowercase hex>`
//!
//! The trailing four characters are a checksum over the random body and a
//! process-wide secret salt. It exists to catch transcription typos before a
//! store or network lookup, nothing more: anyone who knows the salt relation
//! can mint a key that passes, so it must never be treated as a security
//! boundary. Authoritative validity always comes from the store or the
//! remote authority.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix carried by every generated key.
pub const KEY_PREFIX: &str = "AB-";

/// Hex characters in the random key body.
const BODY_LEN: usize = 16;

/// Hex characters in the checksum suffix.
const CHECKSUM_LEN: usize = 4;

/// Generates license keys with a salted checksum suffix.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    salt: String,
}

impl KeyCodec {
    /// Creates a codec with the given secret salt.
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Generates a fresh license key: `AB-` + 16 random hex chars + `-` +
    /// 4-char checksum.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut raw = [0u8; BODY_LEN / 2];
        rand::thread_rng().fill_bytes(&mut raw);
        let body = hex::encode(raw);
        let checksum = self.checksum(&body);
        format!("{KEY_PREFIX}{body}-{checksum}")
    }

    /// Returns true if the key's checksum is consistent with its body.
    ///
    /// Only meaningful on the issuing side (the side that owns the salt);
    /// consuming sites use [`is_well_formed`] instead.
    #[must_use]
    pub fn checksum_matches(&self, key: &str) -> bool {
        let key = key.trim();
        if !is_well_formed(key) {
            return false;
        }
        let body = &key[KEY_PREFIX.len()..KEY_PREFIX.len() + BODY_LEN];
        let suffix = &key[key.len() - CHECKSUM_LEN..];
        self.checksum(&body.to_ascii_lowercase()) == suffix.to_ascii_lowercase()
    }

    fn checksum(&self, body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hasher.update(self.salt.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..CHECKSUM_LEN / 2])
    }
}

/// Returns true if the key matches the `AB-<16 hex>-<4 hex>` pattern,
/// case-insensitively.
///
/// This is a cheap syntactic pre-filter applied before any store or network
/// lookup; it says nothing about whether the key is actually issued.
#[must_use]
pub fn is_well_formed(key: &str) -> bool {
    let key = key.trim();
    if key.len() != KEY_PREFIX.len() + BODY_LEN + 1 + CHECKSUM_LEN {
        return false;
    }
    let (prefix, rest) = key.split_at(KEY_PREFIX.len());
    if !prefix.eq_ignore_ascii_case(KEY_PREFIX) {
        return false;
    }
    let (body, suffix) = rest.split_at(BODY_LEN);
    let Some(checksum) = suffix.strip_prefix('-') else {
        return false;
    };
    is_hex(body) && is_hex(checksum)
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}
