//! test fixtures: a miniature on-disk dataset
//!
//! Builds a self-consistent project (blobs, trees, commits, every
//! relation family) under a temp directory, writes the shard files in
//! the real on-disk formats, and installs the resolved settings
//! process-wide. All SHAs are computed from the fixture content, so the
//! identity invariants hold for free.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use tempfile::TempDir;

use crate::codec::{ber, comp, fnv1a_32};
use crate::error::Result;
use crate::objects::{object_sha1, Sha1};
use crate::storage::{bucket_hash, install_settings, key_cmp, write_vnum, Settings};

const HEADER_SIZE: usize = 256;

/// writes `.tch` files the reader understands; insertion follows the
/// same collision-tree ordering the lookup path walks
pub(crate) struct TchWriter {
    bnum: u64,
    apow: u32,
    large: bool,
    recs: Vec<Rec>,
    stream: Vec<StreamItem>,
    buckets: HashMap<u64, usize>,
}

struct Rec {
    key: Vec<u8>,
    value: Vec<u8>,
    hash: u8,
    left: Option<usize>,
    right: Option<usize>,
}

enum StreamItem {
    Rec(usize),
    Free(u32),
}

impl TchWriter {
    pub fn new(bnum: u64) -> Self {
        TchWriter {
            bnum,
            apow: 0,
            large: false,
            recs: Vec::new(),
            stream: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    /// align records to `1 << apow` bytes, as tuned production files do
    pub fn aligned(mut self, apow: u32) -> Self {
        self.apow = apow;
        self
    }

    /// use 8-byte bucket and chain offsets
    pub fn large(mut self) -> Self {
        self.large = true;
        self
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let (bidx, hash) = bucket_hash(&key, self.bnum);
        let new_idx = self.recs.len();
        let mut cur = match self.buckets.entry(bidx) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(new_idx);
                self.recs.push(Rec { key, value, hash, left: None, right: None });
                self.stream.push(StreamItem::Rec(new_idx));
                return;
            }
            std::collections::hash_map::Entry::Occupied(slot) => *slot.get(),
        };
        loop {
            let ord = hash
                .cmp(&self.recs[cur].hash)
                .then_with(|| key_cmp(&key, &self.recs[cur].key));
            let slot = match ord {
                std::cmp::Ordering::Greater => &mut self.recs[cur].left,
                std::cmp::Ordering::Less => &mut self.recs[cur].right,
                std::cmp::Ordering::Equal => {
                    self.recs[cur].value = value;
                    return;
                }
            };
            match slot {
                Some(next) => cur = *next,
                None => {
                    *slot = Some(new_idx);
                    self.recs.push(Rec { key, value, hash, left: None, right: None });
                    self.stream.push(StreamItem::Rec(new_idx));
                    return;
                }
            }
        }
    }

    /// leave a free block in the record stream, as deletions would
    pub fn free_block(&mut self, size: u32) {
        assert!(size >= 5);
        self.stream.push(StreamItem::Free(size));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let width = if self.large { 8usize } else { 4 };
        let align = 1u64 << self.apow;
        let first = align_up(HEADER_SIZE as u64 + self.bnum * width as u64, align);

        // layout pass
        let mut offsets: HashMap<usize, u64> = HashMap::new();
        let mut sizes: HashMap<usize, (u64, u16)> = HashMap::new();
        let mut cursor = first;
        for item in &self.stream {
            match item {
                StreamItem::Rec(i) => {
                    let rec = &self.recs[*i];
                    let used = 2
                        + 2 * width as u64
                        + 2
                        + vnum_len(rec.key.len() as u64)
                        + vnum_len(rec.value.len() as u64)
                        + rec.key.len() as u64
                        + rec.value.len() as u64;
                    let total = align_up(used, align);
                    offsets.insert(*i, cursor);
                    sizes.insert(*i, (total, (total - used) as u16));
                    cursor += total;
                }
                StreamItem::Free(size) => cursor += u64::from(*size),
            }
        }
        let file_size = cursor;

        let mut buf = vec![0u8; file_size as usize];
        buf[..14].copy_from_slice(b"ToKyO CaBiNeT\n");
        buf[34] = self.apow as u8;
        buf[35] = 10; // free block pool power
        buf[36] = if self.large { 1 } else { 0 };
        buf[40..48].copy_from_slice(&self.bnum.to_le_bytes());
        buf[48..56].copy_from_slice(&(self.recs.len() as u64).to_le_bytes());
        buf[56..64].copy_from_slice(&file_size.to_le_bytes());
        buf[64..72].copy_from_slice(&first.to_le_bytes());

        for (bidx, root) in &self.buckets {
            let pos = HEADER_SIZE + *bidx as usize * width;
            let stored = (offsets[root] >> self.apow).to_le_bytes();
            buf[pos..pos + width].copy_from_slice(&stored[..width]);
        }

        let mut cursor = first;
        for item in &self.stream {
            match item {
                StreamItem::Rec(i) => {
                    let rec = &self.recs[*i];
                    let (total, psiz) = sizes[i];
                    let mut out = Vec::new();
                    out.push(0xc8);
                    out.push(rec.hash);
                    for link in [rec.left, rec.right] {
                        let stored = link.map_or(0, |l| offsets[&l] >> self.apow).to_le_bytes();
                        out.extend_from_slice(&stored[..width]);
                    }
                    out.extend_from_slice(&psiz.to_le_bytes());
                    write_vnum(&mut out, rec.key.len() as u64);
                    write_vnum(&mut out, rec.value.len() as u64);
                    out.extend_from_slice(&rec.key);
                    out.extend_from_slice(&rec.value);
                    let start = cursor as usize;
                    buf[start..start + out.len()].copy_from_slice(&out);
                    cursor += total;
                }
                StreamItem::Free(size) => {
                    let start = cursor as usize;
                    buf[start] = 0xb0;
                    buf[start + 1..start + 5].copy_from_slice(&size.to_le_bytes());
                    cursor += u64::from(*size);
                }
            }
        }

        fs::write(path, buf)?;
        Ok(())
    }
}

fn vnum_len(n: u64) -> u64 {
    let mut buf = Vec::new();
    write_vnum(&mut buf, n);
    buf.len() as u64
}

fn align_up(x: u64, align: u64) -> u64 {
    x.div_ceil(align) * align
}

/// the shared fixture dataset
pub(crate) struct TestData {
    #[allow(dead_code)]
    dir: TempDir,
    pub settings: &'static Settings,
    pub project: Vec<u8>,
    pub c1: Sha1,
    pub c2: Sha1,
    pub c3: Sha1,
    pub t1: Sha1,
    pub t2: Sha1,
    pub td1: Sha1,
    pub b1: Sha1,
    pub b2: Sha1,
    pub b3: Sha1,
    pub b4: Sha1,
    pub b5: Sha1,
    pub b6: Sha1,
    pub b7: Sha1,
    pub b1_content: Vec<u8>,
    pub corrupt_commit: Sha1,
    pub stale_blob: Sha1,
}

/// build the dataset once and install its settings process-wide
pub(crate) fn dataset() -> &'static TestData {
    static DATA: Lazy<TestData> = Lazy::new(|| build().expect("fixture dataset"));
    &DATA
}

const MARAT: &str = "Marat <valiev.m@gmail.com>";
const MERGE_BUTTON: &str = "GitHub Merge Button <merge-button@github.com>";

fn tree_entry(mode: &str, name: &str, sha: Sha1) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(mode.as_bytes());
    out.push(b' ');
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.extend_from_slice(sha.as_bytes());
    out
}

fn commit_object(tree: Sha1, parent: Option<Sha1>, author: &str, date: &str, message: &str) -> Vec<u8> {
    let mut out = format!("tree {}\n", tree);
    if let Some(parent) = parent {
        out.push_str(&format!("parent {}\n", parent));
    }
    out.push_str(&format!("author {} {}\n", author, date));
    out.push_str(&format!("committer {} {}\n", author, date));
    out.push_str(&format!("\n{}\n", message));
    out.into_bytes()
}

fn sha_concat(shas: &[Sha1]) -> Vec<u8> {
    shas.iter().flat_map(|s| s.as_bytes().to_vec()).collect()
}

/// shard writers for one relation family, keyed by shard index
struct Family {
    dir: PathBuf,
    pattern: &'static str,
    mask: u64,
    writers: HashMap<u64, TchWriter>,
}

impl Family {
    fn new(root: &Path, subdir: &str, pattern: &'static str, shards: u64) -> Self {
        let mut writers = HashMap::new();
        for shard in 0..shards {
            writers.insert(shard, TchWriter::new(131));
        }
        Family {
            dir: root.join(subdir),
            pattern,
            mask: shards - 1,
            writers,
        }
    }

    fn put_sha(&mut self, key: Sha1, value: Vec<u8>) {
        let shard = u64::from(key.as_bytes()[0]) & self.mask;
        self.writers.get_mut(&shard).unwrap().put(key.as_bytes().to_vec(), value);
    }

    fn put_text(&mut self, key: &[u8], value: Vec<u8>) {
        let shard = u64::from(fnv1a_32(key)) & self.mask;
        self.writers.get_mut(&shard).unwrap().put(key.to_vec(), value);
    }

    fn finish(self) -> Result<()> {
        for (shard, writer) in self.writers {
            let name = self.pattern.replace("{}", &shard.to_string());
            writer.write(&self.dir.join(name))?;
        }
        Ok(())
    }
}

fn build() -> Result<TestData> {
    let dir = TempDir::new()?;
    let root = dir.path().to_path_buf();

    // blobs
    let b1_content = b"*.egg-info/\ndist/\nbuild/\n*.pyc\n*.mo\n*.gz\n".to_vec();
    let b2_content = b"MiniCMS\n=======\n\nA minimal CMS for Django.\n".to_vec();
    let b3_content = [
        &b2_content[..],
        b"\nInstallation\n------------\n\npip install minicms\n",
    ]
    .concat();
    let b4_content =
        b"from distutils.core import setup\n\nsetup(\n    name='minicms',\n    version='0.1',\n)\n"
            .to_vec();
    let b5_content = b"from django.contrib import admin\n\nadmin.site.register(Page)\n".to_vec();
    let b6_content =
        b"def handler(request):\n    ctx = get_context(request)\n    return render(request, 'index.html', ctx)\n"
            .to_vec();
    let b7_content =
        b"def handler(request):\n    ctx = get_context(request)\n    return render(request, 'home.html', ctx)\n"
            .to_vec();

    let contents = [
        &b1_content, &b2_content, &b3_content, &b4_content, &b5_content, &b6_content, &b7_content,
    ];
    let blob_shas: Vec<Sha1> = contents.iter().map(|c| object_sha1("blob", c)).collect();
    let (b1, b2, b3, b4, b5, b6, b7) = (
        blob_shas[0], blob_shas[1], blob_shas[2], blob_shas[3], blob_shas[4], blob_shas[5],
        blob_shas[6],
    );

    // trees
    let td1_data = tree_entry("100644", "admin.py", b5);
    let td1 = object_sha1("tree", &td1_data);
    let t1_data = [
        tree_entry("100755", ".gitignore", b1),
        tree_entry("100644", "README.rst", b2),
        tree_entry("100644", "old_name.py", b6),
        tree_entry("40000", "sub", td1),
    ]
    .concat();
    let t1 = object_sha1("tree", &t1_data);
    let t2_data = [
        tree_entry("100755", ".gitignore", b1),
        tree_entry("100644", "README.rst", b3),
        tree_entry("100644", "new_name.py", b7),
        tree_entry("100644", "setup.py", b4),
        tree_entry("40000", "sub", td1),
    ]
    .concat();
    let t2 = object_sha1("tree", &t2_data);

    // commits
    let c1_data = commit_object(t1, None, MARAT, "1337145807 +1130", "Initial commit");
    let c1 = object_sha1("commit", &c1_data);
    let c2_data = commit_object(t2, Some(c1), MARAT, "1337350448 +1100", "support no i18n");
    let c2 = object_sha1("commit", &c2_data);
    let c3_data = commit_object(t2, Some(c2), MERGE_BUTTON, "1337400000 +0000", "Merge pull request #1");
    let c3 = object_sha1("commit", &c3_data);

    let corrupt_commit = object_sha1("commit", b"corrupt placeholder");
    let stale_blob = object_sha1("blob", b"stale placeholder");

    // All.sha1c: random-access commit and tree payloads, 4 shards
    let mut commit_random = Family::new(&root, "All.sha1c", "commit_{}.tch", 4);
    for (sha, data) in [(c1, &c1_data), (c2, &c2_data), (c3, &c3_data)] {
        commit_random.put_sha(sha, comp(data));
    }
    commit_random.put_sha(corrupt_commit, vec![0xff, 0xff, 0xff]);
    commit_random.finish()?;

    let mut tree_random = Family::new(&root, "All.sha1c", "tree_{}.tch", 4);
    for (sha, data) in [(t1, &t1_data), (t2, &t2_data), (td1, &td1_data)] {
        tree_random.put_sha(sha, comp(data));
    }
    tree_random.finish()?;

    // All.blobs: packed archives + text indexes, 2 shards per type
    let blobs_dir = root.join("All.blobs");
    fs::create_dir_all(&blobs_dir)?;
    let mut blob_positions: HashMap<Sha1, (u64, u64)> = HashMap::new();
    write_archive(
        &blobs_dir,
        "blob",
        2,
        &blob_shas
            .iter()
            .zip(contents.iter())
            .map(|(&sha, c)| (sha, c.to_vec()))
            .collect::<Vec<_>>(),
        Some(&mut blob_positions),
    )?;
    write_archive(
        &blobs_dir,
        "commit",
        2,
        &[(c1, c1_data.clone()), (c2, c2_data.clone()), (c3, c3_data.clone())],
        None,
    )?;
    write_archive(
        &blobs_dir,
        "tree",
        2,
        &[(t1, t1_data.clone()), (t2, t2_data.clone()), (td1, td1_data.clone())],
        None,
    )?;

    // All.sha1o: blob offsets, 2 shards
    let mut blob_offset = Family::new(&root, "All.sha1o", "sha1.blob_{}.tch", 2);
    for (&sha, &(offset, length)) in &blob_positions {
        blob_offset.put_sha(sha, ber(&[offset, length]));
    }
    blob_offset.put_sha(stale_blob, ber(&[999_999, 64]));
    blob_offset.finish()?;

    // basemaps, version R, 2 shards each
    let base = |pattern| Family::new(&root, "basemaps", pattern, 2);
    let project = b"user2589_minicms".to_vec();

    let mut p2c = base("p2cFullR.{}.tch");
    p2c.put_text(&project, sha_concat(&[c1, c2, c3]));
    p2c.finish()?;

    let mut p2a = base("p2aFullR.{}.tch");
    p2a.put_text(&project, comp(format!("{};{}", MARAT, MERGE_BUTTON).as_bytes()));
    p2a.finish()?;

    let mut c2p = base("c2pFullR.{}.tch");
    for sha in [c1, c2, c3] {
        c2p.put_sha(sha, comp(&project));
    }
    c2p.finish()?;

    let mut c2cc = base("c2ccFullR.{}.tch");
    c2cc.put_sha(c1, sha_concat(&[c2]));
    c2cc.put_sha(c2, sha_concat(&[c3]));
    c2cc.finish()?;

    let mut c2pc = base("c2pcFullR.{}.tch");
    c2pc.put_sha(c2, sha_concat(&[c1]));
    c2pc.put_sha(c3, sha_concat(&[c2]));
    c2pc.finish()?;

    let mut c2ta = base("c2taFullR.{}.tch");
    c2ta.put_sha(c1, comp(format!("1337145807 +1130;{}", MARAT).as_bytes()));
    c2ta.finish()?;

    let mut c2r = base("c2rFullR.{}.tch");
    c2r.put_sha(c2, sha_concat(&[c1]));
    c2r.put_sha(c3, sha_concat(&[c1]));
    c2r.finish()?;

    let mut c2h = base("c2hFullR.{}.tch");
    c2h.put_sha(c1, comp(format!("{};2", c3.hex()).as_bytes()));
    c2h.finish()?;

    let mut c2b = base("c2bFullR.{}.tch");
    c2b.put_sha(c2, sha_concat(&[b3, b4]));
    c2b.finish()?;

    let mut c2f = base("c2fFullR.{}.tch");
    c2f.put_sha(c2, comp(b"README.rst;setup.py"));
    c2f.finish()?;

    let mut a2c = base("a2cFullR.{}.tch");
    a2c.put_text(MARAT.as_bytes(), sha_concat(&[c1, c2]));
    a2c.finish()?;

    let mut a2p = base("a2pFullR.{}.tch");
    a2p.put_text(
        MARAT.as_bytes(),
        comp(b"user2589_minicms;EMPTY;user2589_karta"),
    );
    a2p.finish()?;

    let mut a2f = base("a2fFullR.{}.tch");
    a2f.put_text(
        MARAT.as_bytes(),
        comp(b".gitignore;README.rst;setup.py;sub/admin.py"),
    );
    a2f.finish()?;

    let mut b2c = base("b2cFullR.{}.tch");
    b2c.put_sha(b1, sha_concat(&[c1]));
    b2c.put_sha(b3, sha_concat(&[c2]));
    b2c.finish()?;

    let mut b2fa = base("b2faFullR.{}.tch");
    b2fa.put_sha(b1, comp(format!("1337145807 +1130;{};{}", MARAT, c1.hex()).as_bytes()));
    b2fa.finish()?;

    let mut f2a = base("f2aFullR.{}.tch");
    f2a.put_text(b"README.rst", comp(MARAT.as_bytes()));
    f2a.finish()?;

    let mut f2c = base("f2cFullR.{}.tch");
    f2c.put_text(b"README.rst", sha_concat(&[c1, c2]));
    f2c.put_text(b".gitignore", sha_concat(&[c1, c3]));
    f2c.finish()?;

    let mut f2b = base("f2bFullR.{}.tch");
    f2b.put_text(b"README.rst", sha_concat(&[b2, b3]));
    f2b.finish()?;

    let mut b2f = base("b2fFullR.{}.tch");
    b2f.put_sha(b2, comp(b"README.rst"));
    b2f.finish()?;

    let settings = install_settings(Settings::for_tests(&root));

    Ok(TestData {
        dir,
        settings,
        project,
        c1,
        c2,
        c3,
        t1,
        t2,
        td1,
        b1,
        b2,
        b3,
        b4,
        b5,
        b6,
        b7,
        b1_content,
        corrupt_commit,
        stale_blob,
    })
}

/// write `<kind>_<shard>.bin` and `<kind>_<shard>.idx` pairs
fn write_archive(
    dir: &Path,
    kind: &str,
    shards: u64,
    objects: &[(Sha1, Vec<u8>)],
    mut positions: Option<&mut HashMap<Sha1, (u64, u64)>>,
) -> Result<()> {
    let mask = shards - 1;
    for shard in 0..shards {
        let mut bin = Vec::new();
        let mut idx = String::new();
        let mut id = 0u64;
        for (sha, data) in objects {
            if u64::from(sha.as_bytes()[0]) & mask != shard {
                continue;
            }
            let frame = comp(data);
            idx.push_str(&format!("{};{};{};{}\n", id, bin.len(), frame.len(), sha));
            if let Some(positions) = positions.as_deref_mut() {
                positions.insert(*sha, (bin.len() as u64, frame.len() as u64));
            }
            bin.extend_from_slice(&frame);
            id += 1;
        }
        fs::write(dir.join(format!("{}_{}.bin", kind, shard)), &bin)?;
        fs::write(dir.join(format!("{}_{}.idx", kind, shard)), idx.as_bytes())?;
    }
    Ok(())
}
