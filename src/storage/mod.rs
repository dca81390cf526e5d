//! storage access layer
//!
//! This module turns a (relation, key) question into bytes on disk. The
//! upper layer (the domain model) uses this API and never touches file
//! formats directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       domain model                          │
//! │        (Commit, Tree, Blob, Project, File, Author)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    paths    │       │  tch + pool │       │    pack     │
//!  │ (resolver)  │       │ (.tch maps) │       │ (.bin/.idx) │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! Everything here is read-only and safe under concurrent readers.

mod pack;
mod paths;
mod pool;
mod tch;

pub use pack::{object_scan, parse_idx_line, IdxRecord, ObjectScan};
pub use paths::{install_settings, settings, Category, KeyKind, Relation, Settings};
pub use pool::{bin_handle, bin_read, tch_handle};
pub use tch::{Tch, TchKeys};

#[cfg(test)]
pub(crate) use tch::{bucket_hash, key_cmp, write_vnum};

use std::sync::Arc;

use crate::error::Result;

/// look up a relation value for a key; `Ok(None)` when the key is absent
pub fn relation_get(settings: &Settings, rel: Relation, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let path = settings.path_for(rel, key);
    tch_handle(&path)?.get(key)
}

/// lazily yield every key of every shard of a relation
///
/// relations without a registered key dtype yield an empty sequence; a
/// missing shard surfaces `ShardUnavailable` for that shard only and the
/// scan continues with the next one
pub fn relation_keys(settings: &Settings, rel: Relation) -> RelationKeys<'_> {
    let shards = match rel.keys_dtype() {
        Some(_) => settings.shard_count(rel),
        None => 0,
    };
    RelationKeys {
        settings,
        rel,
        shards,
        next_shard: 0,
        current: None,
    }
}

/// iterator behind [`relation_keys`]
pub struct RelationKeys<'a> {
    settings: &'a Settings,
    rel: Relation,
    shards: u64,
    next_shard: u64,
    current: Option<(Arc<Tch>, u64)>,
}

impl Iterator for RelationKeys<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((tch, off)) = self.current.as_mut() {
                match tch.scan_step(*off) {
                    Ok(Some((key, next))) => {
                        *off = next;
                        return Some(Ok(key));
                    }
                    Ok(None) => self.current = None,
                    Err(e) => {
                        self.current = None;
                        return Some(Err(e));
                    }
                }
                continue;
            }
            if self.next_shard >= self.shards {
                return None;
            }
            let path = self.settings.path_for_shard(self.rel, self.next_shard);
            self.next_shard += 1;
            match tch_handle(&path) {
                Ok(tch) => {
                    let start = tch.scan_start();
                    self.current = Some((tch, start));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
