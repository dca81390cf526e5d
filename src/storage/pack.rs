//! packed-object archives: `.bin` payloads and their `.idx` companions
//!
//! Blob payloads (and, for sequential scans, commit and tree payloads)
//! live concatenated in big `.bin` shards. Random access comes from an
//! offset looked up elsewhere; sequential access walks the text `.idx`
//! shard, one `;`-delimited row per stored object.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};

use crate::codec::decomp;
use crate::error::{Error, Result};
use crate::objects::Sha1;
use crate::storage::paths::{Relation, Settings};
use crate::storage::pool::bin_read;

/// one `.idx` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxRecord {
    pub id: u64,
    pub offset: u64,
    /// compressed length of the record inside the `.bin`
    pub length: u64,
    pub sha: Sha1,
}

/// parse one `.idx` row: `id;offset;compressed_length;sha_hex[;...]`
///
/// blob rows may carry the true SHA in a 5th column; whenever a row has
/// one it wins over the 4th unconditionally, matching the source
/// dataset even where the two diverge (recompressed payloads and dedup
/// aliases hash differently from the upstream content)
pub fn parse_idx_line(line: &str) -> Result<IdxRecord> {
    let corrupt = || Error::CorruptFrame(format!("bad idx row: {}", line));
    let cols: Vec<&str> = line.trim_end().split(';').collect();
    if cols.len() < 4 {
        return Err(corrupt());
    }
    let sha_col = if cols.len() >= 5 { cols[4] } else { cols[3] };
    let sha = Sha1::parse(sha_col.as_bytes()).map_err(|_| corrupt())?;
    Ok(IdxRecord {
        id: cols[0].parse().map_err(|_| corrupt())?,
        offset: cols[1].parse().map_err(|_| corrupt())?,
        length: cols[2].parse().map_err(|_| corrupt())?,
        sha,
    })
}

/// lazy scan over every object of one `.idx`/`.bin` family
///
/// yields `(sha, decompressed object bytes)` in archive order, shard by
/// shard; an unreadable shard surfaces one error and the scan moves on
pub struct ObjectScan<'a> {
    settings: &'a Settings,
    idx_rel: Relation,
    bin_rel: Relation,
    next_shard: u64,
    current: Option<(u64, Lines<BufReader<File>>)>,
}

/// start a scan over an archive family, e.g. all commits
pub fn object_scan(settings: &Settings, idx_rel: Relation, bin_rel: Relation) -> ObjectScan<'_> {
    ObjectScan {
        settings,
        idx_rel,
        bin_rel,
        next_shard: 0,
        current: None,
    }
}

impl ObjectScan<'_> {
    fn read_record(&self, shard: u64, line: &str) -> Result<(Sha1, Vec<u8>)> {
        let row = parse_idx_line(line)?;
        let bin_path = self.settings.path_for_shard(self.bin_rel, shard);
        let data = decomp(&bin_read(&bin_path, row.offset, row.length)?)?;
        Ok((row.sha, data))
    }
}

impl Iterator for ObjectScan<'_> {
    type Item = Result<(Sha1, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((shard, lines)) = self.current.as_mut() {
                let shard = *shard;
                match lines.next() {
                    Some(Ok(line)) if line.is_empty() => continue,
                    Some(Ok(line)) => return Some(self.read_record(shard, &line)),
                    Some(Err(e)) => {
                        self.current = None;
                        let path = self.settings.path_for_shard(self.idx_rel, shard);
                        return Some(Err(Error::shard(path, e)));
                    }
                    None => {
                        self.current = None;
                        continue;
                    }
                }
            }
            if self.next_shard >= self.settings.shard_count(self.idx_rel) {
                return None;
            }
            let shard = self.next_shard;
            self.next_shard += 1;
            let path = self.settings.path_for_shard(self.idx_rel, shard);
            match File::open(&path) {
                Ok(file) => self.current = Some((shard, BufReader::new(file).lines())),
                Err(e) => return Some(Err(Error::shard(path, e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::comp;
    use std::io::Write;

    const SHA_A: &str = "83d22195edc1473673f1bf35307aea6edf3c37e3";
    const SHA_B: &str = "46aaf071f1b859c5bf452733c2583c70d92cd0c8";
    const TRUE_SHA: &str = "fda94b84122f6f36473ca3573794a8f2c4f4a58c";

    #[test]
    fn test_parse_idx_line() {
        let row = parse_idx_line(&format!("0;0;283;{}", SHA_A)).unwrap();
        assert_eq!(row.id, 0);
        assert_eq!(row.offset, 0);
        assert_eq!(row.length, 283);
        assert_eq!(row.sha.hex(), SHA_A);
    }

    #[test]
    fn test_parse_idx_line_prefers_true_sha() {
        // blob rows: the 5th column carries the true SHA and always wins
        let row = parse_idx_line(&format!("1;461;2836;42;{}", TRUE_SHA)).unwrap();
        assert_eq!(row.sha.hex(), TRUE_SHA);

        // a malformed 5th column is a corrupt row, not a fallback
        let err = parse_idx_line(&format!("1;461;2836;{};x", SHA_A)).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_parse_idx_line_rejects_garbage() {
        assert!(parse_idx_line("0;1;2").unwrap_err().is_corrupt());
        assert!(parse_idx_line("a;b;c;d").unwrap_err().is_corrupt());
        assert!(parse_idx_line(&format!("x;0;283;{}", SHA_A)).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_object_scan() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let blobs = root.join("All.blobs");
        std::fs::create_dir_all(&blobs).unwrap();

        let payload_a = b"*.egg-info/\ndist/\nbuild/\n*.pyc\n*.mo\n*.gz\n".to_vec();
        let payload_b = b"from distutils.core import setup\n".repeat(4);

        let mut bin = Vec::new();
        let mut idx = String::new();
        for (i, (sha, payload)) in [(SHA_A, &payload_a), (SHA_B, &payload_b)].iter().enumerate() {
            let frame = comp(payload);
            idx.push_str(&format!("{};{};{};{}\n", i, bin.len(), frame.len(), sha));
            bin.extend_from_slice(&frame);
        }
        std::fs::write(blobs.join("tree_0.bin"), &bin).unwrap();
        let mut f = File::create(blobs.join("tree_0.idx")).unwrap();
        f.write_all(idx.as_bytes()).unwrap();

        let settings = Settings::for_tests(root);
        let scan = object_scan(&settings, Relation::TreeSequentialIdx, Relation::TreeSequentialBin);
        let objects: Vec<(Sha1, Vec<u8>)> = scan.collect::<Result<_>>().unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].0.hex(), SHA_A);
        assert_eq!(objects[0].1, payload_a);
        assert_eq!(objects[1].0.hex(), SHA_B);
        assert_eq!(objects[1].1, payload_b);
    }

    #[test]
    fn test_object_scan_missing_shard() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::for_tests(dir.path());
        // width 0 means one shard, which doesn't exist
        let mut scan = object_scan(&settings, Relation::CommitSequentialIdx, Relation::CommitSequentialBin);
        assert!(matches!(scan.next(), Some(Err(Error::ShardUnavailable { .. }))));
        assert!(scan.next().is_none());
    }
}
