//! raw Git object decoding
//!
//! The dataset stores Git objects exactly as git does, minus the
//! `<type> <len>\0` envelope. This module decodes what the storage layer
//! hands back: 20-byte identifiers, commit headers, and binary tree
//! records. No object graph lives here; that's the `model` layer's job.

mod commit;
mod sha;
mod tree;

pub use commit::{parse_commit, ParsedCommit};
pub use sha::{object_sha1, Sha1};
pub use tree::{parse_tree, TreeEntry};
