//! oscar - random-access navigation over the World of Code dataset
//!
//! This crate answers questions like "which projects contain this
//! commit?" or "walk the first-parent chain of this project" against the
//! WoC mirror of public Git history: hundreds of Tokyo Cabinet shards
//! plus packed LZF-framed object archives. Everything is read-only;
//! lookups are lazy and memoized per entity instance.
//!
//! # Example
//!
//! ```no_run
//! use oscar::{Commit, Project};
//!
//! let commit = Commit::new("e38126dbca6572912013621d2aa9e6f7c50f36bc")?;
//! println!("author: {}", String::from_utf8_lossy(commit.author()?));
//! for name in commit.project_names()? {
//!     println!("in project: {}", String::from_utf8_lossy(&name));
//! }
//!
//! let head = Project::new(&b"user2589_minicms"[..]).head()?;
//! # Ok::<(), oscar::Error>(())
//! ```
//!
//! Paths, versions and shard widths resolve from the environment on
//! first use (`OSCAR_BASEMAPS`, `OSCAR_ALL_SHA1C`, per-relation
//! `OSCAR_<RELATION>` overrides, `OSCAR_TEST` to skip host gating); see
//! [`storage::Settings`].

pub mod codec;
pub mod dates;
mod error;
pub mod model;
pub mod objects;
pub mod storage;
mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use codec::{ber, comp, decomp, fnv1a_32, lzf_length, unber};
pub use dates::parse_commit_date;
pub use error::{Error, Result};
pub use model::{
    Author, Blob, Commit, DiffEntry, File, Project, Tag, Tree, IGNORED_AUTHORS,
};
pub use objects::{object_sha1, Sha1};
