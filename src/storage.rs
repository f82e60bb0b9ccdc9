//! Low-level file primitives shared by the index builders and readers.

pub mod array;
pub mod files;
pub mod funnel;
pub mod sort;

/// Decode one little-endian u64 word from the start of `bytes`.
pub(crate) fn le_word(bytes: &[u8]) -> u64 {
    let mut v = 0u64;
    for i in 0..8 {
        v |= (bytes[i] as u64) << (i * 8);
    }
    v
}
