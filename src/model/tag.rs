//! the Tag entity
//!
//! Tags exist in the dataset as identifiers only; no payload relations
//! are shipped for them, so this is a placeholder with identity and
//! equality semantics.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::objects::Sha1;

/// a tag, addressed by SHA-1
#[derive(Debug, Clone)]
pub struct Tag {
    sha: Sha1,
}

impl Tag {
    /// accept a 40-char hex or 20-byte raw SHA-1
    pub fn new(sha: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Tag {
            sha: Sha1::parse(sha.as_ref())?,
        })
    }

    pub fn sha(&self) -> Sha1 {
        self.sha
    }

    pub fn hex(&self) -> String {
        self.sha.hex()
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "tag".hash(state);
        self.sha.hash(state);
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<tag {}>", self.sha)
    }
}
