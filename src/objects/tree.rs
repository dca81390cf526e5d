//! binary tree record decoding
//!
//! A tree object is a run of `<mode> <name>\0<20-byte sha>` entries with
//! no separators and no count, so the only way to read one is a cursor.
//! Truncated terminal records surface as `CorruptFrame` instead of a
//! read past the buffer.

use crate::error::{Error, Result};
use crate::objects::sha::Sha1;

/// one tree entry in on-disk order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    /// ASCII decimal mode; directories are always `40000`
    pub mode: &'a [u8],
    pub name: &'a [u8],
    pub sha: Sha1,
}

impl TreeEntry<'_> {
    pub fn is_dir(&self) -> bool {
        self.mode == b"40000"
    }
}

/// cursor over the raw bytes of a tree object
pub struct TreeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = Result<TreeEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        match read_entry(self.data, self.pos) {
            Ok((entry, next)) => {
                self.pos = next;
                Some(Ok(entry))
            }
            Err(e) => {
                // stop the cursor, a broken record poisons the rest
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}

fn read_entry(data: &[u8], pos: usize) -> Result<(TreeEntry<'_>, usize)> {
    let truncated = || Error::CorruptFrame("truncated tree entry".into());

    let space = data[pos..]
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(truncated)?;
    let mode = &data[pos..pos + space];
    let name_start = pos + space + 1;
    let nul = data[name_start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(truncated)?;
    let name = &data[name_start..name_start + nul];
    let sha_start = name_start + nul + 1;
    if data.len() < sha_start + 20 {
        return Err(truncated());
    }
    let sha = Sha1::parse(&data[sha_start..sha_start + 20])?;
    Ok((TreeEntry { mode, name, sha }, sha_start + 20))
}

/// iterate the entries of a raw tree object
pub fn parse_tree(data: &[u8]) -> TreeIter<'_> {
    TreeIter { data, pos: 0 }
}
