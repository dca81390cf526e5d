//! two-commit diff with rename detection
//!
//! Exact-name changes are cheap; pairing leftover additions with
//! deletions is not, so candidates go through a cascade of filters
//! (length ratio, then byte-bigram ratio, then the full similarity)
//! each of which must clear the threshold before the next one runs.

use std::collections::HashMap;
use std::sync::Once;

use similar::{capture_diff_slices, get_diff_ratio, Algorithm};
use tracing::warn;

use crate::error::Result;
use crate::model::{Blob, Commit};
use crate::objects::Sha1;

/// one diff entry: `(old_name, new_name, old_sha, new_sha)`
///
/// additions have no old side, deletions no new side; a rename carries
/// both names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub old_name: Option<Vec<u8>>,
    pub new_name: Option<Vec<u8>>,
    pub old_sha: Option<Sha1>,
    pub new_sha: Option<Sha1>,
}

pub(crate) fn diff_commits(a: &Commit, b: &Commit, threshold: f64) -> Result<Vec<DiffEntry>> {
    if !a.parent_shas()?.contains(&b.sha()) {
        static NON_ADJACENT: Once = Once::new();
        NON_ADJACENT.call_once(|| {
            warn!(new = %a.sha(), old = %b.sha(), "diffing commits that are not parent and child");
        });
    }

    let tree_a = a.tree()?;
    let files_a = tree_a.files()?;
    let tree_b = b.tree()?;
    let files_b = tree_b.files()?;

    let mut out = Vec::new();
    for (name, &sha_a) in files_a {
        if let Some(&sha_b) = files_b.get(name) {
            if sha_a != sha_b {
                out.push(DiffEntry {
                    old_name: Some(name.clone()),
                    new_name: Some(name.clone()),
                    old_sha: Some(sha_b),
                    new_sha: Some(sha_a),
                });
            }
        }
    }
    let added: Vec<(&Vec<u8>, Sha1)> = files_a
        .iter()
        .filter(|(name, _)| !files_b.contains_key(*name))
        .map(|(name, &sha)| (name, sha))
        .collect();
    let mut deleted: Vec<(&Vec<u8>, Sha1)> = files_b
        .iter()
        .filter(|(name, _)| !files_a.contains_key(*name))
        .map(|(name, &sha)| (name, sha))
        .collect();

    if threshold >= 1.0 {
        for (name, sha) in added {
            out.push(addition(name, sha));
        }
        for (name, sha) in deleted {
            out.push(deletion(name, sha));
        }
        return Ok(out);
    }

    let mut contents: HashMap<Sha1, Option<Vec<u8>>> = HashMap::new();
    for (add_name, add_sha) in added {
        let matched = blob_content(&mut contents, add_sha).and_then(|_| {
            deleted.iter().position(|&(_, del_sha)| {
                let add_data = match contents.get(&add_sha) {
                    Some(Some(data)) => data.clone(),
                    _ => return false,
                };
                match blob_content(&mut contents, del_sha) {
                    Some(del_data) => similar_enough(&add_data, &del_data, threshold),
                    None => false,
                }
            })
        });
        match matched {
            Some(i) => {
                let (del_name, del_sha) = deleted.remove(i);
                out.push(DiffEntry {
                    old_name: Some(del_name.clone()),
                    new_name: Some(add_name.clone()),
                    old_sha: Some(del_sha),
                    new_sha: Some(add_sha),
                });
            }
            None => out.push(addition(add_name, add_sha)),
        }
    }
    for (name, sha) in deleted {
        out.push(deletion(name, sha));
    }
    Ok(out)
}

fn addition(name: &[u8], sha: Sha1) -> DiffEntry {
    DiffEntry {
        old_name: None,
        new_name: Some(name.to_vec()),
        old_sha: None,
        new_sha: Some(sha),
    }
}

fn deletion(name: &[u8], sha: Sha1) -> DiffEntry {
    DiffEntry {
        old_name: Some(name.to_vec()),
        new_name: None,
        old_sha: Some(sha),
        new_sha: None,
    }
}

/// blob content, fetched once; unretrievable blobs never match
fn blob_content(cache: &mut HashMap<Sha1, Option<Vec<u8>>>, sha: Sha1) -> Option<Vec<u8>> {
    cache
        .entry(sha)
        .or_insert_with(|| Blob::from_sha(sha).data().ok().map(<[u8]>::to_vec))
        .clone()
}

/// the rename filter cascade; every stage must clear the threshold
fn similar_enough(a: &[u8], b: &[u8], threshold: f64) -> bool {
    length_ratio(a.len(), b.len()) > threshold
        && bigram_ratio(a, b) > threshold
        && similarity(a, b) > threshold
}

/// cheap upper bound: two contents of very different size can't match
fn length_ratio(a: usize, b: usize) -> f64 {
    if a + b == 0 {
        return 1.0;
    }
    2.0 * a.min(b) as f64 / (a + b) as f64
}

/// coarse upper bound from byte-bigram multisets
fn bigram_ratio(a: &[u8], b: &[u8]) -> f64 {
    let count = |data: &[u8]| {
        let mut counts: HashMap<[u8; 2], u64> = HashMap::new();
        for pair in data.windows(2) {
            *counts.entry([pair[0], pair[1]]).or_default() += 1;
        }
        counts
    };
    let ca = count(a);
    let cb = count(b);
    let total: u64 = ca.values().sum::<u64>() + cb.values().sum::<u64>();
    if total == 0 {
        return 1.0;
    }
    let common: u64 = ca
        .iter()
        .filter_map(|(bigram, &n)| cb.get(bigram).map(|&m| n.min(m)))
        .sum();
    2.0 * common as f64 / total as f64
}

/// the full longest-common-subsequence style ratio
fn similarity(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let ops = capture_diff_slices(Algorithm::Myers, a, b);
    f64::from(get_diff_ratio(&ops, a.len(), b.len()))
}
