//! Record types shared by the journal writer and reader.

use crate::model::tag::SpanTag;
use crate::sequence::VarintSequence;

/// One term hit within a document: the term's hashed id, its packed
/// word metadata, and the encoded positions where it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub term_id: u64,
    pub meta: u64,
    pub positions: VarintSequence,
}

/// One structural region entry of a document's span block.
///
/// The position sequence interleaves start/end boundaries, so a region
/// that occurs several times (a page with many headings, say)
/// contributes several pairs to a single record. Boundaries must be
/// strictly increasing; touching regions are merged upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    pub tag: SpanTag,
    pub positions: VarintSequence,
}

/// A complete per-document journal record.
#[derive(Debug, Clone, Default)]
pub struct DocRecord {
    pub doc_id: u64,
    pub doc_meta: u64,
    pub features: u32,
    pub size: u32,
    pub postings: Vec<Posting>,
    pub spans: Vec<SpanRecord>,
}

impl DocRecord {
    /// Reset for reuse while keeping the outer allocations.
    pub(crate) fn clear(&mut self) {
        self.doc_id = 0;
        self.doc_meta = 0;
        self.features = 0;
        self.size = 0;
        self.postings.clear();
        self.spans.clear();
    }
}

/// Posting filter applied during journal iteration.
///
/// Filtering happens before postings are materialized, so consumers
/// that only care about a metadata subset (priority-flagged terms,
/// say) never pay for decoding the rest.
#[derive(Debug, Clone, Copy)]
pub struct WordFilter {
    mask: u64,
}

impl WordFilter {
    /// Accept every posting.
    pub fn any() -> WordFilter {
        WordFilter { mask: 0 }
    }

    /// Accept postings whose metadata has at least one of the given
    /// flag bits set.
    pub fn with_flags(mask: u64) -> WordFilter {
        WordFilter { mask }
    }

    pub fn accept(&self, meta: u64) -> bool {
        self.mask == 0 || (meta & self.mask) != 0
    }
}

/// Aggregates gathered in one unfiltered journal pass.
#[derive(Debug, Clone, Default)]
pub struct JournalStatistics {
    pub document_count: u64,
    pub posting_count: u64,
    /// Every distinct term id in the journal, sorted ascending.
    pub term_ids: Vec<u64>,
}

impl JournalStatistics {
    pub fn highest_term_id(&self) -> Option<u64> {
        self.term_ids.last().copied()
    }
}
