//! Journal-to-reverse-index conversion.
//!
//! Conversion inverts the journal in four file passes: count postings
//! per term, scatter (ranked doc id, term metadata) pairs into a
//! term-bucketed intermediate file, sort each term's bucket, then
//! serialize one postings tree per term into the docs file. The
//! intermediate file is anonymous, so its space is reclaimed as soon
//! as the final pass drops it, failed conversions included.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;

use crate::error::{Result, SileneError};
use crate::journal::{JournalReader, WordFilter};
use crate::model::id;
use crate::progress::{Interrupt, ProgressSink, ReverseStep};
use crate::ranking::DomainRankings;
use crate::reverse::WORDS_ENTRY_WORDS;
use crate::reverse::btree::{BTreeContext, BTreeWriter};
use crate::storage::array::LongArray;
use crate::storage::files::ReverseFileSet;
use crate::storage::funnel::{DEFAULT_BIN_SLOTS, RandomWriteFunnel};
use crate::storage::sort::{DEFAULT_SPILL_THRESHOLD, read_pairs, sort_pair_range};

/// Builds the two reverse-index files of a generation from a journal.
pub struct ReverseIndexBuilder {
    files: ReverseFileSet,
    work_dir: PathBuf,
    ctx: BTreeContext,
    filter: WordFilter,
    spill_threshold: usize,
    bin_slots: u64,
}

impl ReverseIndexBuilder {
    pub fn new(files: ReverseFileSet, work_dir: &Path) -> ReverseIndexBuilder {
        ReverseIndexBuilder {
            files,
            work_dir: work_dir.to_path_buf(),
            ctx: BTreeContext::default(),
            filter: WordFilter::any(),
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            bin_slots: DEFAULT_BIN_SLOTS,
        }
    }

    /// Tree geometry for the postings blocks.
    pub fn with_context(mut self, ctx: BTreeContext) -> ReverseIndexBuilder {
        self.ctx = ctx;
        self
    }

    /// Keep only postings whose term metadata matches `filter`. The
    /// words file still lists every term the journal mentions; terms
    /// filtered down to nothing get a zero-length block.
    pub fn with_filter(mut self, filter: WordFilter) -> ReverseIndexBuilder {
        self.filter = filter;
        self
    }

    /// Largest per-term pair count sorted in memory during the sort
    /// pass; larger buckets go through temp-file merge runs.
    pub fn with_spill_threshold(mut self, pairs: usize) -> ReverseIndexBuilder {
        self.spill_threshold = pairs;
        self
    }

    /// Scatter-buffer size of the intermediate write funnel, in slots.
    pub fn with_bin_slots(mut self, bin_slots: u64) -> ReverseIndexBuilder {
        self.bin_slots = bin_slots;
        self
    }

    /// Run the conversion. Within each term's block, postings end up
    /// sorted by rank-encoded document id, so better-ranked domains
    /// come first.
    pub fn convert<P: ProgressSink<ReverseStep>>(
        &self,
        journal: &JournalReader,
        rankings: &DomainRankings,
        progress: &P,
        interrupt: &Interrupt,
    ) -> Result<()> {
        if journal.is_empty() {
            warn!("reverse index conversion requested for an empty journal, nothing to do");
            return Ok(());
        }
        fs::create_dir_all(&self.work_dir)?;

        progress.progress(ReverseStep::AccumulateStatistics);
        interrupt.check()?;
        let stats = journal.statistics()?;
        if stats.posting_count == 0 {
            warn!("journal holds no postings, nothing to do");
            return Ok(());
        }
        let terms = stats.term_ids;

        progress.progress(ReverseStep::CountOffsets);
        let mut counts = vec![0u64; terms.len()];
        journal.for_each_posting(&self.filter, |_, posting| {
            interrupt.check()?;
            counts[slot_of(&terms, posting.term_id)?] += 1;
            Ok(())
        })?;

        // Entry index where each term's run begins.
        let mut entry_starts = vec![0u64; terms.len()];
        let mut total_entries = 0u64;
        for (slot, &count) in counts.iter().enumerate() {
            entry_starts[slot] = total_entries;
            total_entries += count;
        }

        progress.progress(ReverseStep::CreateIntermediate);
        let intermediate = tempfile::tempfile_in(&self.work_dir)?;
        intermediate.set_len(total_entries * 16)?;
        {
            let mut funnel =
                RandomWriteFunnel::new(&self.work_dir, total_entries * 2, self.bin_slots)?;
            let mut cursors = entry_starts.clone();
            journal.for_each_posting(&self.filter, |doc_id, posting| {
                interrupt.check()?;
                let slot = slot_of(&terms, posting.term_id)?;
                let entry = cursors[slot];
                cursors[slot] += 1;

                let ranked = id::with_rank(rankings.rank(id::domain_id(doc_id)), doc_id);
                funnel.put(entry * 2, ranked)?;
                funnel.put(entry * 2 + 1, posting.meta)?;
                Ok(())
            })?;
            funnel.write(&intermediate)?;
        }

        progress.progress(ReverseStep::SortIntermediate);
        entry_starts
            .par_iter()
            .zip(counts.par_iter())
            .try_for_each(|(&start, &count)| -> Result<()> {
                interrupt.check()?;
                sort_pair_range(&intermediate, start, count, self.spill_threshold, &self.work_dir)
            })?;

        progress.progress(ReverseStep::Sizing);
        let mut docs_len = 0usize;
        let mut word_ends = vec![0u64; terms.len()];
        for (slot, &count) in counts.iter().enumerate() {
            if count > 0 {
                docs_len += self.ctx.tree_words(count as usize)?;
            }
            word_ends[slot] = docs_len as u64;
        }

        progress.progress(ReverseStep::FinalizeDocs);
        let mut docs = LongArray::create(&self.files.docs, docs_len)?;
        let mut words = LongArray::create(&self.files.words, terms.len() * WORDS_ENTRY_WORDS)?;
        let writer = BTreeWriter::new(self.ctx);
        let mut offset = 0usize;
        for (slot, &count) in counts.iter().enumerate() {
            interrupt.check()?;
            if count > 0 {
                let entries = read_pairs(&intermediate, entry_starts[slot], count)?;
                offset += writer.write(&mut docs, offset, &entries)?;
            }
            debug_assert_eq!(offset as u64, word_ends[slot]);
            words.set(slot * WORDS_ENTRY_WORDS, terms[slot]);
            words.set(slot * WORDS_ENTRY_WORDS + 1, word_ends[slot]);
        }
        drop(intermediate);

        progress.progress(ReverseStep::Force);
        docs.force()?;
        words.force()?;

        progress.progress(ReverseStep::Finished);
        info!(
            "reverse index conversion finished: {} terms, {} postings, {} words of trees",
            terms.len(),
            total_entries,
            docs_len
        );
        Ok(())
    }
}

/// Slot of `term_id` in the sorted statistics table. Absence means the
/// journal changed between passes.
fn slot_of(terms: &[u64], term_id: u64) -> Result<usize> {
    terms.binary_search(&term_id).map_err(|_| {
        SileneError::internal(format!("term {term_id:#x} missing from the statistics table"))
    })
}
