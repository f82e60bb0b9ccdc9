//! # Silene
//!
//! An index storage engine for full-text search over ranked domains.
//!
//! ## Features
//!
//! - Append-only posting journals with checksummed pages
//! - Compact delta-coded term position sequences
//! - Memory-mapped forward and reverse index generations
//! - Static tree postings searchable straight off the page cache
//! - Domain-rank aware ordering of query results
//! - Atomic generation swaps under concurrent readers

// Core modules
pub mod error;
pub mod forward;
pub mod journal;
pub mod model;
pub mod progress;
pub mod ranking;
pub mod reverse;
pub mod sequence;
pub mod storage;
mod util;

// Re-exports for the public API
pub use error::{Result, SileneError};
pub use forward::spans::{DocumentSpan, DocumentSpans, SpansReader};
pub use forward::{ForwardIndexBuilder, ForwardIndexReader};
pub use journal::{
    DocRecord, JournalReader, JournalStatistics, JournalWriter, Posting, SpanRecord, WordFilter,
};
pub use model::tag::SpanTag;
pub use progress::{Interrupt, LogProgress, NullProgress, ProgressSink};
pub use ranking::DomainRankings;
pub use reverse::{
    BTreeContext, EntrySource, FilterStep, QueryBuffer, ReverseIndexBuilder, ReverseIndexReader,
};
pub use sequence::{PositionSequence, VarintSequence};
pub use storage::files::{Generation, GenerationManifest, IndexFileSet};
pub use util::hash::hash_keyword;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
