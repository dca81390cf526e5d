//! commit header decoding
//!
//! A commit object is a `\n`-separated header, a blank line, and the
//! message. The header is almost-but-not-quite a key/value list: gpgsig
//! values span many lines, mergetag objects embed whole signed tags as
//! space-prefixed continuations, and real-world data contains duplicate
//! and unknown keys. The parser is a small line-by-line state machine
//! that tolerates all of that.

use chrono::{DateTime, FixedOffset};

use crate::dates::parse_commit_date;
use crate::error::{Error, Result};
use crate::objects::sha::Sha1;

const PGP_END: &str = "-----END PGP SIGNATURE-----";

/// every header-derived commit attribute, decoded in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommit {
    pub tree: Sha1,
    pub parents: Vec<Sha1>,
    pub author: Vec<u8>,
    pub authored_at: Option<DateTime<FixedOffset>>,
    pub committer: Vec<u8>,
    pub committed_at: Option<DateTime<FixedOffset>>,
    pub message: Vec<u8>,
    pub full_message: Vec<u8>,
    pub signature: Option<Vec<u8>>,
    pub encoding: String,
}

enum State {
    Normal,
    ReadingSignature,
}

/// decode a raw commit object
pub fn parse_commit(data: &[u8]) -> Result<ParsedCommit> {
    let split = find_subslice(data, b"\n\n")
        .ok_or_else(|| Error::CorruptFrame("commit without blank line".into()))?;
    let header = &data[..split];
    let full_message = &data[split + 2..];
    let message = match full_message.iter().position(|&b| b == b'\n') {
        Some(i) => &full_message[..i],
        None => full_message,
    };

    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = Vec::new();
    let mut authored_at = None;
    let mut committer = Vec::new();
    let mut committed_at = None;
    let mut signature: Option<Vec<u8>> = None;
    let mut encoding = String::from("utf8");

    let mut state = State::Normal;
    for line in header.split(|&b| b == b'\n') {
        match state {
            State::ReadingSignature => {
                let sig = signature.as_mut().expect("set when entering state");
                let content = line.strip_prefix(b" ").unwrap_or(line);
                sig.push(b'\n');
                sig.extend_from_slice(content);
                if content == PGP_END.as_bytes() {
                    state = State::Normal;
                }
            }
            State::Normal => {
                if line.is_empty() {
                    // blank header lines show up after gpgsig blocks
                    continue;
                }
                if line[0] == b' ' {
                    // mergetag continuation, nothing we care about
                    continue;
                }
                let (key, value) = match line.iter().position(|&b| b == b' ') {
                    Some(i) => (&line[..i], &line[i + 1..]),
                    None => (line, &line[line.len()..]),
                };
                match key {
                    b"tree" => {
                        tree = Some(Sha1::parse(value)?);
                    }
                    b"parent" => {
                        parents.push(Sha1::parse(value)?);
                    }
                    b"author" => {
                        let (name, date) = split_person(value);
                        author = name.to_vec();
                        authored_at = date;
                    }
                    b"committer" => {
                        let (name, date) = split_person(value);
                        committer = name.to_vec();
                        committed_at = date;
                    }
                    b"encoding" => {
                        encoding = String::from_utf8_lossy(value).into_owned();
                    }
                    b"gpgsig" => {
                        signature = Some(value.to_vec());
                        if value != PGP_END.as_bytes() {
                            state = State::ReadingSignature;
                        }
                    }
                    // unknown and duplicate keys are ignored
                    _ => {}
                }
            }
        }
    }

    Ok(ParsedCommit {
        tree: tree.ok_or_else(|| Error::CorruptFrame("commit without tree".into()))?,
        parents,
        author,
        authored_at,
        committer,
        committed_at,
        message: message.to_vec(),
        full_message: full_message.to_vec(),
        signature,
        encoding,
    })
}

/// split `Name <email> timestamp ±HHMM` into the person and the date
///
/// malformed trailers leave the whole value as the person and no date
fn split_person(value: &[u8]) -> (&[u8], Option<DateTime<FixedOffset>>) {
    let mut it = value.rsplitn(3, |&b| b == b' ');
    let tz = it.next();
    let ts = it.next();
    let name = it.next();
    match (name, ts, tz) {
        (Some(name), Some(ts), Some(tz)) => (name, parse_commit_date(ts, tz)),
        _ => (value, None),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
