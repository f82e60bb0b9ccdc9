//! Forward index: per-document metadata keyed by document id.
//!
//! The forward index is one of the two derived views built from the
//! posting journal. It answers the per-document questions the ranking
//! layer asks about retrieved candidates: the document's metadata word
//! (with the domain rank spliced in), its feature bits and size, and
//! its structural spans.
//!
//! Three files make up a generation: a sorted array of canonical
//! document ids, a fixed-width data array addressed by the id's
//! position in that sort, and a span store the data array points into.

pub mod builder;
pub mod reader;
pub mod spans;

pub use builder::ForwardIndexBuilder;
pub use reader::ForwardIndexReader;
pub use spans::{DocumentSpan, DocumentSpans, SpansReader, SpansWriter};

/// Data file entry layout, in words. All forward offset arithmetic is
/// derived from these.
pub(crate) const ENTRY_SIZE: usize = 3;
pub(crate) const META_OFFSET: usize = 0;
pub(crate) const FEATURES_OFFSET: usize = 1;
pub(crate) const SPANS_OFFSET: usize = 2;
