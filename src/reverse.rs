//! Reverse index: per-term postings keyed by term id.
//!
//! The reverse index inverts the journal's document-major records into
//! term-major postings lists, sorted within each term by rank-encoded
//! document id so that documents from better domains come first. Query
//! evaluation intersects several terms' lists through the cursor and
//! filter machinery in [`query`].
//!
//! Two files make up a generation:
//!
//! * a words file of (term id, end offset) pairs sorted by term id,
//!   where the offsets are prefix-sum block boundaries in the docs
//!   file, counted in 64-bit words. A term whose block starts where it
//!   ends has no postings.
//! * a docs file holding one serialized [`btree`] block per non-empty
//!   term, addressed by those boundaries.

pub mod btree;
pub mod builder;
pub mod query;
pub mod reader;

pub use btree::{BTreeContext, BTreeReader, BTreeWriter};
pub use builder::ReverseIndexBuilder;
pub use query::{
    AllOfStep, AnyOfStep, EmptyEntrySource, EntrySource, FilterStep, LetThrough, NoPass,
    QueryBuffer, TreeEntrySource,
};
pub use reader::{ReverseIndexReader, TermRejectFilter, TermRetainFilter};

/// Stride of the words file, in words per term entry.
pub(crate) const WORDS_ENTRY_WORDS: usize = 2;
