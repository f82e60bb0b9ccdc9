//! Shared read access to one generation's reverse-index files.

use log::warn;

use crate::error::{Result, SileneError};
use crate::reverse::WORDS_ENTRY_WORDS;
use crate::reverse::btree::{BTreeContext, BTreeReader};
use crate::reverse::query::{EmptyEntrySource, EntrySource, FilterStep, TreeEntrySource};
use crate::storage::array::LongArrayReader;
use crate::storage::files::ReverseFileSet;

/// Query-side view of a reverse index generation.
///
/// Lookups take the rank-encoded document ids the index stores, which
/// is the form entry sources yield them in.
pub struct ReverseIndexReader {
    ctx: BTreeContext,
    words: Option<LongArrayReader>,
    docs: Option<LongArrayReader>,
}

impl ReverseIndexReader {
    /// Open a reverse index. Missing files leave the reader unloaded,
    /// so every query sees an empty index until the next swap.
    pub fn open(ctx: BTreeContext, files: &ReverseFileSet) -> Result<ReverseIndexReader> {
        if !files.all_exist() {
            warn!("reverse index files missing, reader starts unloaded");
            return Ok(ReverseIndexReader { ctx, words: None, docs: None });
        }

        let words = LongArrayReader::open(&files.words)?;
        if words.len() % WORDS_ENTRY_WORDS != 0 {
            return Err(SileneError::index(format!(
                "{} is not a whole number of term entries",
                files.words.display()
            )));
        }
        let docs = LongArrayReader::open(&files.docs)?;
        Ok(ReverseIndexReader { ctx, words: Some(words), docs: Some(docs) })
    }

    pub fn is_loaded(&self) -> bool {
        self.words.is_some()
    }

    pub fn num_terms(&self) -> usize {
        self.words.as_ref().map_or(0, |words| words.len() / WORDS_ENTRY_WORDS)
    }

    /// Word range of `term_id`'s postings block in the docs file. The
    /// first listed term starts at zero; every other term starts where
    /// its predecessor ends.
    fn block_range(&self, term_id: u64) -> Option<(usize, usize)> {
        let words = self.words.as_ref()?;
        let n_terms = words.len() / WORDS_ENTRY_WORDS;
        let slot = words.binary_search_strided(term_id, 0, n_terms, WORDS_ENTRY_WORDS).ok()?;
        let start = if slot == 0 {
            0
        } else {
            words.get((slot - 1) * WORDS_ENTRY_WORDS + 1) as usize
        };
        let end = words.get(slot * WORDS_ENTRY_WORDS + 1) as usize;
        Some((start, end))
    }

    /// The postings tree of `term_id`, when it has one. Unknown terms,
    /// zero-length blocks and damaged blocks all read as absent.
    fn tree_for(&self, term_id: u64) -> Option<BTreeReader<'_>> {
        let (start, end) = self.block_range(term_id)?;
        if start == end {
            return None;
        }
        let docs = self.docs.as_ref()?;
        match BTreeReader::open(self.ctx, docs, start) {
            Ok(tree) => Some(tree),
            Err(err) => {
                warn!("unreadable postings block for term {term_id:#x}: {err}");
                None
            }
        }
    }

    /// Number of documents holding `term_id`.
    pub fn num_documents(&self, term_id: u64) -> usize {
        self.tree_for(term_id).map_or(0, |tree| tree.num_entries())
    }

    pub fn has_document(&self, term_id: u64, doc_id: u64) -> bool {
        self.tree_for(term_id).and_then(|tree| tree.find_entry(doc_id)).is_some()
    }

    /// Term metadata of the posting (term, document), or 0 when the
    /// posting does not exist.
    pub fn metadata_for(&self, term_id: u64, doc_id: u64) -> u64 {
        self.tree_for(term_id).and_then(|tree| tree.find_value(doc_id)).unwrap_or(0)
    }

    /// Cursor over `term_id`'s postings, best-ranked documents first.
    pub fn entry_source(&self, term_id: u64) -> Box<dyn EntrySource + '_> {
        let (Some(docs), Some(tree)) = (self.docs.as_ref(), self.tree_for(term_id)) else {
            return Box::new(EmptyEntrySource);
        };
        let (offset, n_entries) = tree.data_range();
        Box::new(TreeEntrySource::new(docs, offset, n_entries, self.ctx.entry_size))
    }

    /// Filter step keeping ids that hold `term_id`.
    pub fn retain_filter(&self, term_id: u64) -> TermRetainFilter<'_> {
        TermRetainFilter { reader: self, term_id, cost: self.num_documents(term_id) as f64 }
    }

    /// Filter step dropping ids that hold `term_id`.
    pub fn reject_filter(&self, term_id: u64) -> TermRejectFilter<'_> {
        TermRejectFilter { reader: self, term_id, cost: self.num_documents(term_id) as f64 }
    }
}

pub struct TermRetainFilter<'a> {
    reader: &'a ReverseIndexReader,
    term_id: u64,
    cost: f64,
}

impl FilterStep for TermRetainFilter<'_> {
    fn test(&self, value: u64) -> bool {
        self.reader.has_document(self.term_id, value)
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}

pub struct TermRejectFilter<'a> {
    reader: &'a ReverseIndexReader,
    term_id: u64,
    cost: f64,
}

impl FilterStep for TermRejectFilter<'_> {
    fn test(&self, value: u64) -> bool {
        !self.reader.has_document(self.term_id, value)
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}
