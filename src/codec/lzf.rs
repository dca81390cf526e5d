//! Compress::LZF frame codec
//!
//! Perl's Compress::LZF prepends a variable-length uncompressed-size
//! header to the LZF body; the bit layout comes from `LZF.xs`,
//! `decompress_sv`. A leading null byte means the payload is stored
//! verbatim from byte 1. The body itself is delegated to the `lzf` crate.

use crate::error::{Error, Result};

/// extract the uncompressed length from a Compress::LZF header
///
/// returns `(header_size, uncompressed_length)` in bytes
pub fn lzf_length(raw: &[u8]) -> Result<(usize, usize)> {
    let lower = *raw
        .first()
        .ok_or_else(|| Error::CorruptFrame("empty LZF frame".into()))?
        as usize;
    let csize = raw.len();
    let mut start = 1usize;
    let mut mask = 0x80usize;
    while mask != 0 && csize > start && (lower & mask) != 0 {
        // the first continuation bit consumes two positions
        mask >>= 1 + usize::from(mask == 0x80);
        start += 1;
    }
    if mask == 0 || csize < start {
        return Err(Error::CorruptFrame("invalid LZF length header".into()));
    }
    let mut usize_ = lower & (mask - 1);
    for &b in &raw[1..start] {
        usize_ = (usize_ << 6) | (b & 0x3f) as usize;
    }
    if usize_ == 0 {
        return Err(Error::CorruptFrame("zero uncompressed length".into()));
    }
    Ok((start, usize_))
}

/// decompress a Compress::LZF frame
///
/// empty input yields empty output; a leading null byte means the rest of
/// the frame is the payload itself
pub fn decomp(raw: &[u8]) -> Result<Vec<u8>> {
    match raw.first() {
        None => Ok(Vec::new()),
        Some(0) => Ok(raw[1..].to_vec()),
        Some(_) => {
            let (start, usize_) = lzf_length(raw)?;
            lzf::decompress(&raw[start..], usize_)
                .map_err(|e| Error::CorruptFrame(format!("lzf: {:?}", e)))
        }
    }
}

/// compress data into a Compress::LZF frame
///
/// the inverse of [`decomp`]; incompressible data is stored verbatim
/// behind a null marker, exactly as `compress_sv` does
pub fn comp(data: &[u8]) -> Vec<u8> {
    match lzf::compress(data) {
        Ok(body) => {
            let mut out = encode_length(data.len());
            out.extend_from_slice(&body);
            out
        }
        Err(_) => {
            let mut out = Vec::with_capacity(data.len() + 1);
            out.push(0);
            out.extend_from_slice(data);
            out
        }
    }
}

/// UTF-8-style length header from `compress_sv`
fn encode_length(usize_: usize) -> Vec<u8> {
    match usize_ {
        0..=0x7f => vec![usize_ as u8],
        0x80..=0x7ff => vec![0xc0 | (usize_ >> 6) as u8, 0x80 | (usize_ & 0x3f) as u8],
        0x800..=0xffff => vec![
            0xe0 | (usize_ >> 12) as u8,
            0x80 | ((usize_ >> 6) & 0x3f) as u8,
            0x80 | (usize_ & 0x3f) as u8,
        ],
        0x1_0000..=0x1f_ffff => vec![
            0xf0 | (usize_ >> 18) as u8,
            0x80 | ((usize_ >> 12) & 0x3f) as u8,
            0x80 | ((usize_ >> 6) & 0x3f) as u8,
            0x80 | (usize_ & 0x3f) as u8,
        ],
        _ => vec![
            0xf8 | (usize_ >> 24) as u8,
            0x80 | ((usize_ >> 18) & 0x3f) as u8,
            0x80 | ((usize_ >> 12) & 0x3f) as u8,
            0x80 | ((usize_ >> 6) & 0x3f) as u8,
            0x80 | (usize_ & 0x3f) as u8,
        ],
    }
}
