//! path resolution: from a (relation, key) pair to a shard file on disk
//!
//! Every relation is backed by a family of shard files named by a
//! template with `{ver}` and `{key}` placeholders. Resolution picks the
//! newest version present on disk, derives the shard-index bit width
//! from the filenames actually there, and honors the environment
//! override surface. The resolved table is immutable for the process
//! lifetime.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::codec::fnv1a_32;
use crate::error::{Error, Result};

/// hosts the dataset cluster is known to run on
const KNOWN_HOSTS: &[&str] = &["da0", "da1", "da2", "da3", "da4", "da5"];
const CLUSTER_DOMAIN: &str = "eecs.utk.edu";

/// a directory family of shard files, overridable via its env name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    AllBlobs,
    AllSha1c,
    AllSha1o,
    Basemaps,
}

impl Category {
    pub fn env_name(self) -> &'static str {
        match self {
            Category::AllBlobs => "OSCAR_ALL_BLOBS",
            Category::AllSha1c => "OSCAR_ALL_SHA1C",
            Category::AllSha1o => "OSCAR_ALL_SHA1O",
            Category::Basemaps => "OSCAR_BASEMAPS",
        }
    }

    pub fn default_prefix(self) -> &'static str {
        match self {
            Category::AllBlobs => "/da4_data/All.blobs/",
            Category::AllSha1c => "/fast/All.sha1c/",
            Category::AllSha1o => "/fast/All.sha1o/",
            Category::Basemaps => "/da0_data/basemaps/",
        }
    }
}

/// how keys pick their shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// first byte of a 20-byte SHA, masked to the shard width
    Sha,
    /// FNV-1a of the raw key bytes, masked to the shard width
    Text,
}

/// every relation the dataset ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    CommitRandom,
    TreeRandom,
    BlobOffset,
    BlobData,
    CommitSequentialIdx,
    CommitSequentialBin,
    TreeSequentialIdx,
    TreeSequentialBin,
    BlobSequentialIdx,
    CommitProjects,
    CommitChildren,
    CommitTimeAuthor,
    CommitRoot,
    CommitHead,
    CommitParent,
    AuthorCommits,
    AuthorProjects,
    AuthorFiles,
    ProjectAuthors,
    CommitBlobs,
    CommitFiles,
    ProjectCommits,
    BlobCommits,
    BlobAuthor,
    FileAuthors,
    FileCommits,
    FileBlobs,
    BlobFiles,
}

impl Relation {
    pub const ALL: &'static [Relation] = &[
        Relation::CommitRandom,
        Relation::TreeRandom,
        Relation::BlobOffset,
        Relation::BlobData,
        Relation::CommitSequentialIdx,
        Relation::CommitSequentialBin,
        Relation::TreeSequentialIdx,
        Relation::TreeSequentialBin,
        Relation::BlobSequentialIdx,
        Relation::CommitProjects,
        Relation::CommitChildren,
        Relation::CommitTimeAuthor,
        Relation::CommitRoot,
        Relation::CommitHead,
        Relation::CommitParent,
        Relation::AuthorCommits,
        Relation::AuthorProjects,
        Relation::AuthorFiles,
        Relation::ProjectAuthors,
        Relation::CommitBlobs,
        Relation::CommitFiles,
        Relation::ProjectCommits,
        Relation::BlobCommits,
        Relation::BlobAuthor,
        Relation::FileAuthors,
        Relation::FileCommits,
        Relation::FileBlobs,
        Relation::BlobFiles,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Relation::CommitRandom => "commit_random",
            Relation::TreeRandom => "tree_random",
            Relation::BlobOffset => "blob_offset",
            Relation::BlobData => "blob_data",
            Relation::CommitSequentialIdx => "commit_sequential_idx",
            Relation::CommitSequentialBin => "commit_sequential_bin",
            Relation::TreeSequentialIdx => "tree_sequential_idx",
            Relation::TreeSequentialBin => "tree_sequential_bin",
            Relation::BlobSequentialIdx => "blob_sequential_idx",
            Relation::CommitProjects => "commit_projects",
            Relation::CommitChildren => "commit_children",
            Relation::CommitTimeAuthor => "commit_time_author",
            Relation::CommitRoot => "commit_root",
            Relation::CommitHead => "commit_head",
            Relation::CommitParent => "commit_parent",
            Relation::AuthorCommits => "author_commits",
            Relation::AuthorProjects => "author_projects",
            Relation::AuthorFiles => "author_files",
            Relation::ProjectAuthors => "project_authors",
            Relation::CommitBlobs => "commit_blobs",
            Relation::CommitFiles => "commit_files",
            Relation::ProjectCommits => "project_commits",
            Relation::BlobCommits => "blob_commits",
            Relation::BlobAuthor => "blob_author",
            Relation::FileAuthors => "file_authors",
            Relation::FileCommits => "file_commits",
            Relation::FileBlobs => "file_blobs",
            Relation::BlobFiles => "blob_files",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Relation::CommitRandom | Relation::TreeRandom => Category::AllSha1c,
            Relation::BlobOffset => Category::AllSha1o,
            Relation::BlobData
            | Relation::CommitSequentialIdx
            | Relation::CommitSequentialBin
            | Relation::TreeSequentialIdx
            | Relation::TreeSequentialBin
            | Relation::BlobSequentialIdx => Category::AllBlobs,
            _ => Category::Basemaps,
        }
    }

    fn template(self) -> &'static str {
        match self {
            Relation::CommitRandom => "commit_{key}.tch",
            Relation::TreeRandom => "tree_{key}.tch",
            Relation::BlobOffset => "sha1.blob_{key}.tch",
            Relation::BlobData => "blob_{key}.bin",
            Relation::CommitSequentialIdx => "commit_{key}.idx",
            Relation::CommitSequentialBin => "commit_{key}.bin",
            Relation::TreeSequentialIdx => "tree_{key}.idx",
            Relation::TreeSequentialBin => "tree_{key}.bin",
            Relation::BlobSequentialIdx => "blob_{key}.idx",
            Relation::CommitProjects => "c2pFull{ver}.{key}.tch",
            Relation::CommitChildren => "c2ccFull{ver}.{key}.tch",
            Relation::CommitTimeAuthor => "c2taFull{ver}.{key}.tch",
            Relation::CommitRoot => "c2rFull{ver}.{key}.tch",
            Relation::CommitHead => "c2hFull{ver}.{key}.tch",
            Relation::CommitParent => "c2pcFull{ver}.{key}.tch",
            Relation::AuthorCommits => "a2cFull{ver}.{key}.tch",
            Relation::AuthorProjects => "a2pFull{ver}.{key}.tch",
            Relation::AuthorFiles => "a2fFull{ver}.{key}.tch",
            Relation::ProjectAuthors => "p2aFull{ver}.{key}.tch",
            Relation::CommitBlobs => "c2bFull{ver}.{key}.tch",
            Relation::CommitFiles => "c2fFull{ver}.{key}.tch",
            Relation::ProjectCommits => "p2cFull{ver}.{key}.tch",
            Relation::BlobCommits => "b2cFull{ver}.{key}.tch",
            Relation::BlobAuthor => "b2faFull{ver}.{key}.tch",
            Relation::FileAuthors => "f2aFull{ver}.{key}.tch",
            Relation::FileCommits => "f2cFull{ver}.{key}.tch",
            Relation::FileBlobs => "f2bFull{ver}.{key}.tch",
            Relation::BlobFiles => "b2fFull{ver}.{key}.tch",
        }
    }

    pub fn key_kind(self) -> KeyKind {
        match self {
            Relation::AuthorCommits
            | Relation::AuthorProjects
            | Relation::AuthorFiles
            | Relation::ProjectAuthors
            | Relation::ProjectCommits
            | Relation::FileAuthors
            | Relation::FileCommits
            | Relation::FileBlobs => KeyKind::Text,
            _ => KeyKind::Sha,
        }
    }

    /// key dtype for whole-relation key iteration; None means the
    /// relation is not registered for it and iteration yields nothing
    pub fn keys_dtype(self) -> Option<KeyKind> {
        match self {
            Relation::ProjectCommits
            | Relation::AuthorCommits
            | Relation::FileCommits
            | Relation::FileAuthors => Some(KeyKind::Text),
            Relation::BlobCommits => Some(KeyKind::Sha),
            _ => None,
        }
    }

    fn env_override(self) -> String {
        format!("OSCAR_{}", self.name().to_uppercase())
    }
}

/// one resolved relation: directory, filename with `{key}` left in,
/// and the shard-index bit width
#[derive(Debug, Clone)]
struct ResolvedRelation {
    dir: PathBuf,
    filename: String,
    width: u32,
}

/// the immutable path table, built once per process
#[derive(Debug)]
pub struct Settings {
    host: String,
    relations: HashMap<Relation, ResolvedRelation>,
}

impl Settings {
    /// read the environment, gate on the host, resolve every relation
    pub fn from_env() -> Result<Self> {
        let test_mode = env::var_os("OSCAR_TEST").is_some();
        let host = host_gate(test_mode)?;
        let mut relations = HashMap::new();
        for &rel in Relation::ALL {
            let dir = env::var(rel.env_override())
                .or_else(|_| env::var(rel.category().env_name()))
                .unwrap_or_else(|_| rel.category().default_prefix().to_string());
            let dir = rewrite_local_prefix(&dir, &host);
            relations.insert(rel, resolve(rel, dir.into(), test_mode));
        }
        Ok(Settings { host, relations })
    }

    /// resolve against a fixture tree, skipping host gating entirely
    pub fn for_tests(root: &Path) -> Self {
        let mut relations = HashMap::new();
        for &rel in Relation::ALL {
            let dir = root.join(match rel.category() {
                Category::AllBlobs => "All.blobs",
                Category::AllSha1c => "All.sha1c",
                Category::AllSha1o => "All.sha1o",
                Category::Basemaps => "basemaps",
            });
            relations.insert(rel, resolve(rel, dir, true));
        }
        Settings {
            host: "testhost".into(),
            relations,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// shard-index bit width of a relation
    pub fn width(&self, rel: Relation) -> u32 {
        self.relations[&rel].width
    }

    /// number of shard files backing a relation
    pub fn shard_count(&self, rel: Relation) -> u64 {
        1u64 << self.relations[&rel].width
    }

    /// which shard a key lives in
    pub fn shard_for(&self, rel: Relation, key: &[u8]) -> u64 {
        let mask = (1u64 << self.relations[&rel].width) - 1;
        match rel.key_kind() {
            KeyKind::Sha => u64::from(key.first().copied().unwrap_or(0)) & mask,
            KeyKind::Text => u64::from(fnv1a_32(key)) & mask,
        }
    }

    /// concrete path of one shard
    pub fn path_for_shard(&self, rel: Relation, shard: u64) -> PathBuf {
        let resolved = &self.relations[&rel];
        resolved
            .dir
            .join(resolved.filename.replace("{key}", &shard.to_string()))
    }

    /// concrete path of the shard holding a key
    pub fn path_for(&self, rel: Relation, key: &[u8]) -> PathBuf {
        self.path_for_shard(rel, self.shard_for(rel, key))
    }
}

/// a prefix under `/<this_host>_data` is the NFS export of a local disk;
/// read it through the local mount instead
fn rewrite_local_prefix(dir: &str, host: &str) -> String {
    let exported = format!("/{}_data", host);
    match dir.strip_prefix(&exported) {
        Some(rest) => format!("/data{}", rest),
        None => dir.to_string(),
    }
}

fn resolve(rel: Relation, dir: PathBuf, test_mode: bool) -> ResolvedRelation {
    let template = rel.template();
    let filename = if template.contains("{ver}") {
        let ver = env::var(format!("{}_VER", rel.env_override()))
            .or_else(|_| env::var(format!("{}_VER", rel.category().env_name())))
            .unwrap_or_else(|_| detect_version(&dir, template));
        template.replace("{ver}", &ver)
    } else {
        template.to_string()
    };
    let width = match detect_width(&dir, &filename) {
        Some(width) => width,
        None => {
            if !test_mode {
                warn!(relation = rel.name(), dir = %dir.display(), "no shard files found");
            }
            0
        }
    };
    ResolvedRelation { dir, filename, width }
}

/// newest version on disk: glob with `ver=*`, `key=0`, strip the literal
/// parts of the pattern and keep the best leftover
fn detect_version(dir: &Path, template: &str) -> String {
    let pattern = template.replace("{ver}", "*").replace("{key}", "0");
    pick_version(glob_middles(dir, &pattern)).unwrap_or_default()
}

/// longest candidate wins, ties broken by lexical maximum
fn pick_version(candidates: impl IntoIterator<Item = String>) -> Option<String> {
    candidates
        .into_iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
}

/// shard bit width: glob with `key=*`, parse every leftover as a decimal
/// shard index, return the bit length of the largest
fn detect_width(dir: &Path, filename: &str) -> Option<u32> {
    let pattern = filename.replace("{key}", "*");
    let max_key = glob_middles(dir, &pattern)
        .filter_map(|middle| middle.parse::<u64>().ok())
        .max()?;
    Some(64 - max_key.leading_zeros())
}

/// run a single-`*` glob and yield whatever the `*` matched
fn glob_middles(dir: &Path, pattern: &str) -> impl Iterator<Item = String> {
    let (prefix, suffix) = pattern.split_once('*').unwrap_or((pattern, ""));
    let prefix = prefix.to_string();
    let suffix = suffix.to_string();
    let full = dir.join(pattern).to_string_lossy().into_owned();
    glob::glob(&full)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(move |path| {
            let name = path.file_name()?.to_str()?;
            name.strip_prefix(prefix.as_str())?
                .strip_suffix(suffix.as_str())
                .map(str::to_string)
        })
}

/// refuse to initialize away from the dataset cluster
fn host_gate(test_mode: bool) -> Result<String> {
    let raw = fs::read_to_string("/etc/hostname")
        .map_err(|e| Error::UnsupportedPlatform(format!("cannot read /etc/hostname: {}", e)))?;
    let full = raw.trim();
    let (host, domain) = full.split_once('.').unwrap_or((full, ""));
    if !test_mode && domain != CLUSTER_DOMAIN {
        return Err(Error::UnsupportedPlatform(format!(
            "host {} is not on {}; set OSCAR_TEST to override",
            full, CLUSTER_DOMAIN
        )));
    }
    if !KNOWN_HOSTS.contains(&host) {
        warn!(host, "running on an unrecognized host");
    }
    Ok(host.to_string())
}

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// the process-wide path table, built from the environment on first use
pub fn settings() -> Result<&'static Settings> {
    SETTINGS.get_or_try_init(Settings::from_env)
}

/// install an explicit path table; the first install wins and later
/// environment-based initialization is skipped
pub fn install_settings(new: Settings) -> &'static Settings {
    SETTINGS.get_or_init(|| new)
}
