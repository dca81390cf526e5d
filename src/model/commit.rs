//! the Commit entity

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Once;

use chrono::{DateTime, FixedOffset};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::codec::decomp;
use crate::dates::parse_commit_date;
use crate::error::{Error, Result};
use crate::model::diff::diff_commits;
use crate::model::{relation_bytes, sha_list, string_list, DiffEntry, Project, Tree};
use crate::objects::{parse_commit, ParsedCommit, Sha1};
use crate::storage::{object_scan, settings, Relation};

/// a commit, addressed by SHA-1
///
/// header attributes (tree, parents, author, dates, signature) are all
/// decoded together the first time any of them is touched
#[derive(Debug, Clone)]
pub struct Commit {
    sha: Sha1,
    data: OnceCell<Vec<u8>>,
    parsed: OnceCell<ParsedCommit>,
}

impl Commit {
    /// accept a 40-char hex or 20-byte raw SHA-1
    pub fn new(sha: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self::from_sha(Sha1::parse(sha.as_ref())?))
    }

    pub(crate) fn from_sha(sha: Sha1) -> Self {
        Commit {
            sha,
            data: OnceCell::new(),
            parsed: OnceCell::new(),
        }
    }

    fn with_data(sha: Sha1, data: Vec<u8>) -> Self {
        let commit = Self::from_sha(sha);
        let _ = commit.data.set(data);
        commit
    }

    pub fn sha(&self) -> Sha1 {
        self.sha
    }

    pub fn hex(&self) -> String {
        self.sha.hex()
    }

    /// the decoded raw object
    pub fn data(&self) -> Result<&[u8]> {
        self.data
            .get_or_try_init(|| {
                decomp(&relation_bytes(
                    Relation::CommitRandom,
                    "commit",
                    self.sha.as_bytes(),
                )?)
            })
            .map(Vec::as_slice)
    }

    fn parsed(&self) -> Result<&ParsedCommit> {
        self.parsed.get_or_try_init(|| parse_commit(self.data()?))
    }

    /// can the raw object be fetched and decoded at all
    pub(crate) fn is_retrievable(&self) -> bool {
        self.parsed().is_ok()
    }

    /// root tree of the commit
    pub fn tree(&self) -> Result<Tree> {
        Ok(Tree::from_sha(self.parsed()?.tree))
    }

    /// ordered parent SHAs
    pub fn parent_shas(&self) -> Result<&[Sha1]> {
        Ok(&self.parsed()?.parents)
    }

    /// parent commits, in header order
    pub fn parents(&self) -> Result<impl Iterator<Item = Commit> + '_> {
        Ok(self.parent_shas()?.iter().map(|&sha| Commit::from_sha(sha)))
    }

    /// first line of the message
    pub fn message(&self) -> Result<&[u8]> {
        Ok(&self.parsed()?.message)
    }

    pub fn full_message(&self) -> Result<&[u8]> {
        Ok(&self.parsed()?.full_message)
    }

    /// author as raw `Name <email>` bytes
    pub fn author(&self) -> Result<&[u8]> {
        Ok(&self.parsed()?.author)
    }

    pub fn authored_at(&self) -> Result<Option<DateTime<FixedOffset>>> {
        Ok(self.parsed()?.authored_at)
    }

    pub fn committer(&self) -> Result<&[u8]> {
        Ok(&self.parsed()?.committer)
    }

    pub fn committed_at(&self) -> Result<Option<DateTime<FixedOffset>>> {
        Ok(self.parsed()?.committed_at)
    }

    /// PGP signature block, if the commit carries one
    pub fn signature(&self) -> Result<Option<&[u8]>> {
        Ok(self.parsed()?.signature.as_deref())
    }

    pub fn encoding(&self) -> Result<&str> {
        Ok(&self.parsed()?.encoding)
    }

    /// names of the projects containing this commit
    pub fn project_names(&self) -> Result<Vec<Vec<u8>>> {
        string_list(Relation::CommitProjects, "commit", self.sha.as_bytes())
    }

    pub fn projects(&self) -> Result<Vec<Project>> {
        Ok(self.project_names()?.into_iter().map(Project::new).collect())
    }

    /// parent SHAs according to the relation table, without decoding
    /// the object itself
    pub fn parent_shas_rel(&self) -> Result<Vec<Sha1>> {
        sha_list(Relation::CommitParent, "commit", self.sha.as_bytes())
    }

    /// SHAs of the commits that have this one as a parent
    pub fn child_shas(&self) -> Result<Vec<Sha1>> {
        sha_list(Relation::CommitChildren, "commit", self.sha.as_bytes())
    }

    pub fn children(&self) -> Result<Vec<Commit>> {
        Ok(self.child_shas()?.into_iter().map(Commit::from_sha).collect())
    }

    /// blob SHAs reachable from the root tree
    pub fn blob_shas(&self) -> Result<Vec<Sha1>> {
        let tree = self.tree()?;
        let files = tree.files()?;
        Ok(files.values().copied().collect())
    }

    /// blob SHAs from the cached relation
    ///
    /// the relation is known to miss the first file of every tree; kept
    /// for compatibility, prefer [`Commit::blob_shas`]
    pub fn blob_shas_rel(&self) -> Result<Vec<Sha1>> {
        static DEPRECATED: Once = Once::new();
        DEPRECATED.call_once(|| {
            warn!(
                relation = "commit_blobs",
                "deprecated: misses the first file of every tree; use blob_shas"
            );
        });
        sha_list(Relation::CommitBlobs, "commit", self.sha.as_bytes())
    }

    /// file names touched by this commit
    pub fn changed_file_names(&self) -> Result<Vec<Vec<u8>>> {
        string_list(Relation::CommitFiles, "commit", self.sha.as_bytes())
    }

    /// authored timestamp and author according to the relation table,
    /// without decoding the object itself
    pub fn time_author(&self) -> Result<(Option<DateTime<FixedOffset>>, Vec<u8>)> {
        let fields = string_list(Relation::CommitTimeAuthor, "commit", self.sha.as_bytes())?;
        let (time, author) = match &fields[..] {
            [time, author, ..] => (time.clone(), author.clone()),
            _ => {
                return Err(Error::CorruptFrame(format!(
                    "commit_time_author record for {}",
                    self.sha
                )))
            }
        };
        let parsed = match time.split(|&b| b == b' ').collect::<Vec<_>>()[..] {
            [ts, tz] => parse_commit_date(ts, tz),
            _ => None,
        };
        Ok((parsed, author))
    }

    /// root of the first-parent chain this commit sits on
    pub fn root_sha(&self) -> Result<Sha1> {
        let shas = sha_list(Relation::CommitRoot, "commit", self.sha.as_bytes())?;
        shas.first()
            .copied()
            .ok_or_else(|| Error::CorruptFrame(format!("empty commit_root record for {}", self.sha)))
    }

    /// head commit reachable from this one, with its distance
    pub fn head(&self) -> Result<(Sha1, u64)> {
        let fields = string_list(Relation::CommitHead, "commit", self.sha.as_bytes())?;
        let (sha, distance) = match &fields[..] {
            [sha, distance] => (sha, distance),
            _ => {
                return Err(Error::CorruptFrame(format!(
                    "commit_head record for {}",
                    self.sha
                )))
            }
        };
        let distance = std::str::from_utf8(distance)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::CorruptFrame(format!("commit_head distance for {}", self.sha)))?;
        Ok((Sha1::parse(sha)?, distance))
    }

    /// diff against another commit, usually a parent
    ///
    /// yields `(old_name, new_name, old_sha, new_sha)` entries; with
    /// `threshold < 1` rename detection pairs up additions and deletions
    /// by content similarity
    pub fn diff(&self, other: &Commit, threshold: f64) -> Result<Vec<DiffEntry>> {
        diff_commits(self, other, threshold)
    }

    /// every commit in the dataset, in archive order, data pre-populated
    pub fn all() -> Result<impl Iterator<Item = Result<Commit>>> {
        let scan = object_scan(
            settings()?,
            Relation::CommitSequentialIdx,
            Relation::CommitSequentialBin,
        );
        Ok(scan.map(|item| item.map(|(sha, data)| Commit::with_data(sha, data))))
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Commit {}

impl Hash for Commit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "commit".hash(state);
        self.sha.hash(state);
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data() {
            Ok(data) => f.write_str(&String::from_utf8_lossy(data)),
            Err(_) => write!(f, "<commit {}>", self.sha),
        }
    }
}
