//! wire codecs for the binary record formats used across the dataset
//!
//! Three small codecs live here:
//! - `ber`: Perl `pack 'w'` base-128 varints (blob offsets and lengths)
//! - `lzf`: the Compress::LZF frame wrapping every stored object
//! - `fnv`: the 32-bit FNV-1a hash that shards non-SHA keys

mod ber;
mod fnv;
mod lzf;

pub use ber::{ber, unber, unber_pair};
pub use fnv::fnv1a_32;
pub use lzf::{comp, decomp, lzf_length};
