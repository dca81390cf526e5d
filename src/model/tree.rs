//! the Tree entity

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::OnceCell;

use crate::codec::decomp;
use crate::error::Result;
use crate::model::{relation_bytes, Blob};
use crate::objects::{parse_tree, Sha1, TreeEntry};
use crate::storage::{object_scan, settings, Relation};

/// a tree, addressed by SHA-1
///
/// iteration yields `(mode, name, sha)` triples in on-disk order;
/// `files` maps every recursively reachable non-directory name to its
/// blob SHA
#[derive(Debug, Clone)]
pub struct Tree {
    sha: Sha1,
    data: OnceCell<Vec<u8>>,
    files: OnceCell<BTreeMap<Vec<u8>, Sha1>>,
}

impl Tree {
    /// accept a 40-char hex or 20-byte raw SHA-1
    pub fn new(sha: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self::from_sha(Sha1::parse(sha.as_ref())?))
    }

    pub(crate) fn from_sha(sha: Sha1) -> Self {
        Tree {
            sha,
            data: OnceCell::new(),
            files: OnceCell::new(),
        }
    }

    fn with_data(sha: Sha1, data: Vec<u8>) -> Self {
        let tree = Self::from_sha(sha);
        let _ = tree.data.set(data);
        tree
    }

    pub fn sha(&self) -> Sha1 {
        self.sha
    }

    pub fn hex(&self) -> String {
        self.sha.hex()
    }

    /// the raw tree object
    pub fn data(&self) -> Result<&[u8]> {
        self.data
            .get_or_try_init(|| {
                decomp(&relation_bytes(
                    Relation::TreeRandom,
                    "tree",
                    self.sha.as_bytes(),
                )?)
            })
            .map(Vec::as_slice)
    }

    /// entries of this tree only, in on-disk order
    pub fn entries(&self) -> Result<impl Iterator<Item = Result<TreeEntry<'_>>>> {
        Ok(parse_tree(self.data()?))
    }

    /// recursive walk: every entry of this tree and, for directories,
    /// the entries of the subtree with `parent/child` names
    pub fn traverse(&self) -> Result<TreeTraverse> {
        Ok(TreeTraverse {
            stack: vec![Frame {
                data: self.data()?.to_vec(),
                pos: 0,
                prefix: Vec::new(),
            }],
        })
    }

    /// every recursively reachable non-directory, name to blob SHA
    pub fn files(&self) -> Result<&BTreeMap<Vec<u8>, Sha1>> {
        self.files.get_or_try_init(|| {
            let mut files = BTreeMap::new();
            for item in self.traverse()? {
                let (mode, name, sha) = item?;
                if mode != b"40000" {
                    files.insert(name, sha);
                }
            }
            Ok(files)
        })
    }

    /// blobs of all reachable files
    pub fn blobs(&self) -> Result<Vec<Blob>> {
        Ok(self.files()?.values().map(|&sha| Blob::from_sha(sha)).collect())
    }

    /// number of reachable files
    pub fn len(&self) -> Result<usize> {
        Ok(self.files()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.files()?.is_empty())
    }

    /// membership by file name
    pub fn contains_name(&self, name: &[u8]) -> Result<bool> {
        Ok(self.files()?.contains_key(name))
    }

    /// membership by blob SHA, hex or raw
    pub fn contains_sha(&self, sha: impl AsRef<[u8]>) -> Result<bool> {
        let sha = Sha1::parse(sha.as_ref())?;
        Ok(self.files()?.values().any(|&s| s == sha))
    }

    /// membership by blob
    pub fn contains_blob(&self, blob: &Blob) -> Result<bool> {
        Ok(self.files()?.values().any(|&s| s == blob.sha()))
    }

    /// every tree in the dataset, in archive order, data pre-populated
    pub fn all() -> Result<impl Iterator<Item = Result<Tree>>> {
        let scan = object_scan(
            settings()?,
            Relation::TreeSequentialIdx,
            Relation::TreeSequentialBin,
        );
        Ok(scan.map(|item| item.map(|(sha, data)| Tree::with_data(sha, data))))
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Tree {}

impl Hash for Tree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "tree".hash(state);
        self.sha.hash(state);
    }
}

/// one `mode name hex_sha` line per entry, like `git cat-file -p`
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(_) => return write!(f, "<tree {}>", self.sha),
        };
        let mut first = true;
        for entry in entries.flatten() {
            if !first {
                f.write_str("\n")?;
            }
            first = false;
            write!(
                f,
                "{} {} {}",
                String::from_utf8_lossy(entry.mode),
                String::from_utf8_lossy(entry.name),
                entry.sha
            )?;
        }
        Ok(())
    }
}

struct Frame {
    data: Vec<u8>,
    pos: usize,
    prefix: Vec<u8>,
}

/// depth-first recursive tree walk
pub struct TreeTraverse {
    stack: Vec<Frame>,
}

impl Iterator for TreeTraverse {
    type Item = Result<(Vec<u8>, Vec<u8>, Sha1)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            if frame.pos >= frame.data.len() {
                self.stack.pop();
                continue;
            }
            let mut cursor = parse_tree(&frame.data[frame.pos..]);
            let entry = match cursor.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            };
            let consumed = entry.mode.len() + 1 + entry.name.len() + 1 + 20;
            frame.pos += consumed;

            let mut full_name = frame.prefix.clone();
            if !full_name.is_empty() {
                full_name.push(b'/');
            }
            full_name.extend_from_slice(entry.name);
            let mode = entry.mode.to_vec();
            let sha = entry.sha;

            if entry.is_dir() {
                let prefix = full_name.clone();
                match Tree::from_sha(sha).data() {
                    Ok(data) => self.stack.push(Frame {
                        data: data.to_vec(),
                        pos: 0,
                        prefix,
                    }),
                    Err(e) => {
                        self.stack.clear();
                        return Some(Err(e));
                    }
                }
            }
            return Some(Ok((mode, full_name, sha)));
        }
    }
}
