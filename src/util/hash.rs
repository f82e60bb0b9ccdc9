//! Stable 64-bit keyword hashing.
//!
//! Term identifiers are murmur3 x64/128 hashes folded to 64 bits by
//! xor-ing the two halves. The function is fixed for the life of an
//! index: journal writers, index builders and query-side callers must
//! all derive term ids from the same bytes, and rebuilding an index
//! from the same journal must reproduce identical ids.

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

const SEED: u64 = 104_729;

/// Hash a normalized keyword into its 64-bit term id.
///
/// Synthetic multi-word terms are joined with `'_'` before hashing by
/// the upstream keyword extractor; this function sees only the final
/// string.
pub fn hash_keyword(keyword: &str) -> u64 {
    hash_bytes(keyword.as_bytes())
}

/// Hash raw bytes with the keyword hash function.
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h1 = SEED;
    let mut h2 = SEED;

    let mut chunks = data.chunks_exact(16);
    for block in &mut chunks {
        let k1 = read_u64_le(block, 0);
        let k2 = read_u64_le(block, 8);

        h1 ^= k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        h2 ^= k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }

    let tail = chunks.remainder();
    if tail.len() > 8 {
        let mut k2 = 0u64;
        for (i, &b) in tail[8..].iter().enumerate() {
            k2 ^= (b as u64) << (i * 8);
        }
        h2 ^= k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
    }
    if !tail.is_empty() {
        let mut k1 = 0u64;
        for (i, &b) in tail[..tail.len().min(8)].iter().enumerate() {
            k1 ^= (b as u64) << (i * 8);
        }
        h1 ^= k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
    }

    h1 ^= data.len() as u64;
    h2 ^= data.len() as u64;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 ^ h2
}

fn read_u64_le(data: &[u8], at: usize) -> u64 {
    let mut v = 0u64;
    for i in 0..8 {
        v |= (data[at + i] as u64) << (i * 8);
    }
    v
}

fn fmix64(mut hash: u64) -> u64 {
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51_afd7_ed55_8ccd);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    hash ^= hash >> 33;
    hash
}
