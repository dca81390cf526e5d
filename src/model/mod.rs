//! the domain model
//!
//! Entities are cheap to construct (key validation only); every storage
//! interaction is lazy and memoized per instance. Two entities are equal
//! iff they are the same kind and carry the same key. There is no
//! cross-entity cache: instances are meant to be created, drained and
//! dropped.

mod author;
mod blob;
mod commit;
mod diff;
mod file;
mod project;
mod tag;
mod tree;

pub use author::Author;
pub use blob::Blob;
pub use commit::Commit;
pub use diff::DiffEntry;
pub use file::File;
pub use project::Project;
pub use tag::Tag;
pub use tree::{Tree, TreeTraverse};

use crate::codec::decomp;
use crate::error::{Error, Result};
use crate::objects::Sha1;
use crate::storage::{relation_get, settings, KeyKind, Relation};
use crate::util::{slice20, to_hex};

/// commits by these authors are dropped from project and file commit
/// iteration; the raw relations still return them
pub const IGNORED_AUTHORS: &[&[u8]] = &[b"GitHub Merge Button <merge-button@github.com>"];

fn key_display(rel: Relation, key: &[u8]) -> String {
    match rel.key_kind() {
        KeyKind::Sha => to_hex(key),
        KeyKind::Text => String::from_utf8_lossy(key).into_owned(),
    }
}

/// raw relation value for a key; absence is an `ObjectNotFound` tagged
/// with the caller's entity kind
pub(crate) fn relation_bytes(rel: Relation, kind: &'static str, key: &[u8]) -> Result<Vec<u8>> {
    relation_get(settings()?, rel, key)?
        .ok_or_else(|| Error::not_found(kind, key_display(rel, key)))
}

/// decode a raw 20-byte SHA concatenation
pub(crate) fn sha_list(rel: Relation, kind: &'static str, key: &[u8]) -> Result<Vec<Sha1>> {
    let raw = relation_bytes(rel, kind, key)?;
    Ok(slice20(&raw)
        .map(|chunk| {
            let mut sha = [0u8; 20];
            sha.copy_from_slice(chunk);
            Sha1::from(sha)
        })
        .collect())
}

/// decode an LZF-compressed `;`-joined byte-string list
///
/// the literal `EMPTY` sentinel is dropped during decoding
pub(crate) fn string_list(rel: Relation, kind: &'static str, key: &[u8]) -> Result<Vec<Vec<u8>>> {
    let raw = decomp(&relation_bytes(rel, kind, key)?)?;
    Ok(raw
        .split(|&b| b == b';')
        .filter(|part| !part.is_empty() && *part != b"EMPTY")
        .map(<[u8]>::to_vec)
        .collect())
}
