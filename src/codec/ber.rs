//! Perl BER packing, the `pack 'w'` template
//!
//! A sequence of unsigned integers packed back-to-back, base 128,
//! big-endian within each integer, high bit set on every byte except the
//! last one of each integer. Blob archive offsets exceed 4 GiB, so the
//! accumulator is 64-bit.

use crate::error::{Error, Result};

/// unpack a stream of BER integers
///
/// a trailing byte with its continuation bit set is silently dropped,
/// matching Perl's behavior on truncated streams
pub fn unber(data: &[u8]) -> Vec<u64> {
    let mut res = Vec::new();
    let mut acc: u64 = 0;
    for &b in data {
        acc = (acc << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            res.push(acc);
            acc = 0;
        }
    }
    res
}

/// unpack exactly two BER integers, e.g. an (offset, length) record
///
/// unlike the streaming form, a trailing continuation bit is an error here
pub fn unber_pair(data: &[u8]) -> Result<(u64, u64)> {
    if let Some(&last) = data.last() {
        if last & 0x80 != 0 {
            return Err(Error::CorruptFrame("trailing BER continuation".into()));
        }
    }
    let ints = unber(data);
    match ints[..] {
        [a, b] => Ok((a, b)),
        _ => Err(Error::CorruptFrame(format!(
            "expected 2 BER integers, got {}",
            ints.len()
        ))),
    }
}

/// pack integers back into BER form
pub fn ber(numbers: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for &num in numbers {
        let mut chunk = [0u8; 10];
        let mut i = chunk.len();
        let mut n = num;
        loop {
            i -= 1;
            chunk[i] = (n & 0x7f) as u8;
            n >>= 7;
            if n == 0 {
                break;
            }
        }
        for (j, &b) in chunk[i..].iter().enumerate() {
            let last = j == chunk.len() - i - 1;
            out.push(if last { b } else { b | 0x80 });
        }
    }
    out
}
