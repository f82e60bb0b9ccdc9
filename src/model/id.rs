//! Document id encoding.
//!
//! Bits 58-63: rank (6 bits), zero until spliced in during index construction
//! Bit  57:    reserved
//! Bits 26-56: domain ID (31 bits)
//! Bits 0-25:  document ordinal within the domain (26 bits)
//!
//! The rank bits bias the sort order of postings so that documents from
//! higher-priority domains (numerically lower rank) come first within a
//! term's postings list. Stripping the rank recovers the canonical id,
//! which is the key the forward index is built around.

pub const DOMAIN_ID_BITS: u32 = 31;
pub const ORDINAL_BITS: u32 = 26;
pub const RANK_BITS: u32 = 6;

pub const DOMAIN_ID_MASK: u64 = (1 << DOMAIN_ID_BITS) - 1;
pub const ORDINAL_MASK: u64 = (1 << ORDINAL_BITS) - 1;

pub const RANK_SHIFT: u32 = 58;
pub const RANK_MASK: u64 = 0xFC00_0000_0000_0000;

/// Highest rank value the id encoding can carry.
pub const MAX_RANK: u32 = (1 << RANK_BITS) - 1;

/// Create a 64-bit document id from a domain id and a document ordinal.
pub fn encode_doc_id(domain_id: u32, ordinal: u32) -> u64 {
    ((domain_id as u64 & DOMAIN_ID_MASK) << ORDINAL_BITS) | (ordinal as u64 & ORDINAL_MASK)
}

/// Extract the domain id from a document id, rank-encoded or not.
pub fn domain_id(doc_id: u64) -> u32 {
    ((doc_id >> ORDINAL_BITS) & DOMAIN_ID_MASK) as u32
}

/// Extract the within-domain document ordinal.
pub fn ordinal(doc_id: u64) -> u32 {
    (doc_id & ORDINAL_MASK) as u32
}

/// Splice a domain rank into the high bits of a document id.
///
/// Ranks above [`MAX_RANK`] are clamped. Any rank already present is
/// replaced.
pub fn with_rank(rank: u32, doc_id: u64) -> u64 {
    (doc_id & !RANK_MASK) | ((rank.min(MAX_RANK) as u64) << RANK_SHIFT)
}

/// Strip the rank bits, recovering the canonical document id.
pub fn without_rank(doc_id: u64) -> u64 {
    doc_id & !RANK_MASK
}

/// Extract the rank bits from a rank-encoded document id.
pub fn rank(doc_id: u64) -> u32 {
    (doc_id >> RANK_SHIFT) as u32
}
