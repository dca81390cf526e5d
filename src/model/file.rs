//! the File entity

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::model::{sha_list, string_list, Blob, Commit, IGNORED_AUTHORS};
use crate::objects::Sha1;
use crate::storage::{relation_keys, settings, Relation};

/// a file, addressed by its path bytes (which may end with a newline,
/// exactly as recorded in the dataset)
#[derive(Debug, Clone)]
pub struct File {
    name: Vec<u8>,
}

impl File {
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        File { name: name.into() }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// raw relation: SHAs of every commit that changed this file
    pub fn commit_shas(&self) -> Result<Vec<Sha1>> {
        sha_list(Relation::FileCommits, "file", &self.name)
    }

    /// commits that changed this file, ignored authors and
    /// unretrievable commits dropped
    pub fn commits(&self) -> Result<Vec<Commit>> {
        let mut commits = Vec::new();
        for sha in self.commit_shas()? {
            let commit = Commit::from_sha(sha);
            if !commit.is_retrievable() {
                continue;
            }
            if IGNORED_AUTHORS.contains(&commit.author()?) {
                continue;
            }
            commits.push(commit);
        }
        Ok(commits)
    }

    /// author strings recorded for this file
    pub fn author_names(&self) -> Result<Vec<Vec<u8>>> {
        string_list(Relation::FileAuthors, "file", &self.name)
    }

    /// SHAs of the blobs this file has pointed at
    pub fn blob_shas(&self) -> Result<Vec<Sha1>> {
        sha_list(Relation::FileBlobs, "file", &self.name)
    }

    pub fn blobs(&self) -> Result<Vec<Blob>> {
        Ok(self.blob_shas()?.into_iter().map(Blob::from_sha).collect())
    }

    /// every file path the dataset knows
    pub fn all() -> Result<impl Iterator<Item = Result<File>>> {
        let keys = relation_keys(settings()?, Relation::FileCommits);
        Ok(keys.map(|item| item.map(File::new)))
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for File {}

impl Hash for File {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "file".hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.name))
    }
}
