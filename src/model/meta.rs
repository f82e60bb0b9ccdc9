//! Bit-packed metadata words for documents and term postings.
//!
//! A document metadata word packs ranking inputs the retrieval layer
//! consumes without a forward-index schema:
//!
//! ```text
//! Bits 56-63: unused
//! Bits 48-55: domain rank, spliced in during conversion
//! Bits 40-47: encoded document size class
//! Bits 32-39: topology
//! Bits 24-31: publication year (offset from 1900)
//! Bits 16-19: sets
//! Bits 8-11:  quality
//! Bits 0-7:   document flags
//! ```
//!
//! A word metadata word carries the per-posting flags plus a saturating
//! occurrence count:
//!
//! ```text
//! Bits 16-23: count
//! Bits 0-15:  term flags
//! ```

pub const DOC_RANK_SHIFT: u32 = 48;
pub const DOC_RANK_MASK: u64 = 0xFF;

const ENC_SIZE_SHIFT: u32 = 40;
const TOPOLOGY_SHIFT: u32 = 32;
const YEAR_SHIFT: u32 = 24;
const SETS_SHIFT: u32 = 16;
const QUALITY_SHIFT: u32 = 8;

const SETS_MASK: u64 = 0xF;
const QUALITY_MASK: u64 = 0xF;

/// Pack document-level metadata into a single word. The rank byte is
/// left zero; it is added per generation by [`encode_rank`].
pub fn encode_doc_meta(
    enc_size: u8,
    topology: u8,
    year: u8,
    sets: u8,
    quality: u8,
    flags: u8,
) -> u64 {
    ((enc_size as u64) << ENC_SIZE_SHIFT)
        | ((topology as u64) << TOPOLOGY_SHIFT)
        | ((year as u64) << YEAR_SHIFT)
        | ((sets as u64 & SETS_MASK) << SETS_SHIFT)
        | ((quality as u64 & QUALITY_MASK) << QUALITY_SHIFT)
        | flags as u64
}

/// Splice a domain rank into a document metadata word, clamping to the
/// 8 bits available.
pub fn encode_rank(meta: u64, rank: u32) -> u64 {
    meta | ((rank.min(DOC_RANK_MASK as u32) as u64) << DOC_RANK_SHIFT)
}

/// Read the rank back out of a document metadata word.
pub fn decode_rank(meta: u64) -> u32 {
    ((meta >> DOC_RANK_SHIFT) & DOC_RANK_MASK) as u32
}

pub fn doc_year(meta: u64) -> u8 {
    (meta >> YEAR_SHIFT) as u8
}

pub fn doc_quality(meta: u64) -> u8 {
    ((meta >> QUALITY_SHIFT) & QUALITY_MASK) as u8
}

pub fn doc_flags(meta: u64) -> u8 {
    meta as u8
}

/// Term flags carried in word metadata.
pub mod word_flags {
    /// Term appears in the document title.
    pub const TITLE: u64 = 1 << 0;
    /// Term appears in a subject-like phrase.
    pub const SUBJECTS: u64 = 1 << 1;
    /// Term looks like a proper name.
    pub const NAMES: u64 = 1 << 2;
    /// Term appears in the site name.
    pub const SITE: u64 = 1 << 3;
    /// Term appears on an adjacent page of the same site.
    pub const SITE_ADJACENT: u64 = 1 << 4;
    /// Term appears in the URL domain.
    pub const URL_DOMAIN: u64 = 1 << 5;
    /// Term appears in the URL path.
    pub const URL_PATH: u64 = 1 << 6;
    /// Term appears in incoming anchor text.
    pub const EXTERNAL_LINK: u64 = 1 << 7;
    /// Term has a high TF-IDF score for this document.
    pub const TF_IDF_HIGH: u64 = 1 << 8;
    /// Term was generated, not observed in the text.
    pub const SYNTHETIC: u64 = 1 << 9;
}

const WORD_FLAGS_MASK: u64 = 0xFFFF;
const WORD_COUNT_SHIFT: u32 = 16;
const WORD_COUNT_MASK: u64 = 0xFF;

/// Pack term flags and a saturating occurrence count.
pub fn encode_word_meta(flags: u64, count: u32) -> u64 {
    (flags & WORD_FLAGS_MASK) | ((count.min(WORD_COUNT_MASK as u32) as u64) << WORD_COUNT_SHIFT)
}

pub fn word_flags(meta: u64) -> u64 {
    meta & WORD_FLAGS_MASK
}

pub fn word_count(meta: u64) -> u32 {
    ((meta >> WORD_COUNT_SHIFT) & WORD_COUNT_MASK) as u32
}

/// True if every flag in `mask` is set in `meta`.
pub fn has_flags(meta: u64, mask: u64) -> bool {
    meta & mask == mask
}
