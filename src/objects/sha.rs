//! SHA-1 identifiers
//!
//! This makes sure we don't accidentally pass hex where raw bytes are
//! expected: every identifier is normalized into 20 raw bytes at
//! construction and formatted back to hex only for display.

use std::fmt;

use sha1::{Digest, Sha1 as Sha1Hasher};

use crate::error::{Error, Result};
use crate::util::{from_hex, to_hex};

/// a 20-byte Git object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha1([u8; 20]);

impl Sha1 {
    /// accept either a 40-char hex string or 20 raw bytes
    ///
    /// any other length is a construction error
    pub fn parse(input: &[u8]) -> Result<Self> {
        match input.len() {
            40 => {
                let bin = from_hex(input)
                    .ok_or_else(|| Error::InvalidSha(String::from_utf8_lossy(input).into_owned()))?;
                let mut sha = [0u8; 20];
                sha.copy_from_slice(&bin);
                Ok(Sha1(sha))
            }
            20 => {
                let mut sha = [0u8; 20];
                sha.copy_from_slice(input);
                Ok(Sha1(sha))
            }
            _ => Err(Error::InvalidSha(String::from_utf8_lossy(input).into_owned())),
        }
    }

    /// raw 20 bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// lowercase 40-char hex form
    pub fn hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl fmt::Display for Sha1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl From<[u8; 20]> for Sha1 {
    fn from(bytes: [u8; 20]) -> Self {
        Sha1(bytes)
    }
}

/// canonical SHA-1 of a Git object: `sha1("<type> <len>\0<data>")`
pub fn object_sha1(kind: &str, data: &[u8]) -> Sha1 {
    let mut hasher = Sha1Hasher::new();
    hasher.update(kind.as_bytes());
    hasher.update(b" ");
    hasher.update(data.len().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(data);
    let digest: [u8; 20] = hasher.finalize().into();
    Sha1(digest)
}
