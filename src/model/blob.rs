//! the Blob entity

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use once_cell::sync::OnceCell;

use crate::codec::{decomp, unber_pair};
use crate::error::{Error, Result};
use crate::model::{relation_bytes, sha_list, string_list, Commit};
use crate::objects::{object_sha1, Sha1};
use crate::storage::{bin_read, settings, Relation};

/// a blob, addressed by SHA-1
///
/// content lives in the packed archive; the `(offset, length)` position
/// comes from a separate offset relation
#[derive(Debug, Clone)]
pub struct Blob {
    sha: Sha1,
    position: OnceCell<(u64, u64)>,
    data: OnceCell<Vec<u8>>,
}

impl Blob {
    /// accept a 40-char hex or 20-byte raw SHA-1
    pub fn new(sha: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self::from_sha(Sha1::parse(sha.as_ref())?))
    }

    pub(crate) fn from_sha(sha: Sha1) -> Self {
        Blob {
            sha,
            position: OnceCell::new(),
            data: OnceCell::new(),
        }
    }

    pub fn sha(&self) -> Sha1 {
        self.sha
    }

    pub fn hex(&self) -> String {
        self.sha.hex()
    }

    /// `(offset, compressed length)` in the blob archive shard
    pub fn position(&self) -> Result<(u64, u64)> {
        self.position
            .get_or_try_init(|| {
                let raw = relation_bytes(Relation::BlobOffset, "blob", self.sha.as_bytes())?;
                unber_pair(&raw)
            })
            .copied()
    }

    /// the decompressed file content
    ///
    /// a stale offset pointing past the archive, and a record that fails
    /// to decompress, both surface as not-found
    pub fn data(&self) -> Result<&[u8]> {
        self.data
            .get_or_try_init(|| {
                let (offset, length) = self.position()?;
                let path = settings()?.path_for(Relation::BlobData, self.sha.as_bytes());
                let raw = bin_read(&path, offset, length)?;
                decomp(&raw).map_err(|_| Error::not_found("blob", self.sha.hex()))
            })
            .map(Vec::as_slice)
    }

    /// content length in bytes
    pub fn len(&self) -> Result<usize> {
        Ok(self.data()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.data()?.is_empty())
    }

    /// SHAs of the commits that introduced or modified this blob
    ///
    /// commits that removed the blob are not listed; that asymmetry is
    /// how the relation is built
    pub fn commit_shas(&self) -> Result<Vec<Sha1>> {
        sha_list(Relation::BlobCommits, "blob", self.sha.as_bytes())
    }

    pub fn commits(&self) -> Result<Vec<Commit>> {
        Ok(self.commit_shas()?.into_iter().map(Commit::from_sha).collect())
    }

    /// `(timestamp, author, commit sha)` of the earliest commit that
    /// introduced this blob
    pub fn first_author(&self) -> Result<(Vec<u8>, Vec<u8>, Sha1)> {
        let fields = string_list(Relation::BlobAuthor, "blob", self.sha.as_bytes())?;
        match &fields[..] {
            [time, author, sha] => Ok((time.clone(), author.clone(), Sha1::parse(sha)?)),
            _ => Err(Error::CorruptFrame(format!(
                "blob_author record for {}",
                self.sha
            ))),
        }
    }

    /// names of the files this blob has appeared as
    pub fn file_names(&self) -> Result<Vec<Vec<u8>>> {
        string_list(Relation::BlobFiles, "blob", self.sha.as_bytes())
    }

    /// SHA-1 a byte string the way git would hash it as a blob
    pub fn string_sha(data: &[u8]) -> Sha1 {
        object_sha1("blob", data)
    }

    /// SHA-1 a file on the local filesystem as a git blob
    pub fn file_sha(path: impl AsRef<Path>) -> Result<Sha1> {
        Ok(object_sha1("blob", &std::fs::read(path)?))
    }

    /// every blob of one archive shard family, in archive order
    pub fn all() -> Result<impl Iterator<Item = Result<Blob>>> {
        let scan = crate::storage::object_scan(
            settings()?,
            Relation::BlobSequentialIdx,
            Relation::BlobData,
        );
        Ok(scan.map(|item| {
            item.map(|(sha, data)| {
                let blob = Blob::from_sha(sha);
                let _ = blob.data.set(data);
                blob
            })
        }))
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Blob {}

impl Hash for Blob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "blob".hash(state);
        self.sha.hash(state);
    }
}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data() {
            Ok(data) => f.write_str(&String::from_utf8_lossy(data)),
            Err(_) => write!(f, "<blob {}>", self.sha),
        }
    }
}
