//! Forward index construction.

use ahash::AHashMap;
use log::warn;
use roaring::RoaringTreemap;

use crate::error::Result;
use crate::forward::spans::SpansWriter;
use crate::forward::{ENTRY_SIZE, FEATURES_OFFSET, META_OFFSET, SPANS_OFFSET};
use crate::journal::{JournalReader, WordFilter};
use crate::model::{id, meta};
use crate::progress::{ForwardStep, Interrupt, ProgressSink};
use crate::ranking::DomainRankings;
use crate::storage::array::LongArray;
use crate::storage::files::ForwardFileSet;

/// Builds the forward index file triple from two journal passes.
///
/// The first pass collects the distinct document ids and lays them out
/// sorted; an id's position in that sort is its slot in the data file,
/// so no id lookup table is written to disk. The second pass fills in
/// each document's entry and streams its spans to the span store.
pub struct ForwardIndexBuilder {
    files: ForwardFileSet,
}

impl ForwardIndexBuilder {
    /// Callers pass the next-generation file set, so a failed or
    /// cancelled conversion never touches live files.
    pub fn new(files: ForwardFileSet) -> ForwardIndexBuilder {
        ForwardIndexBuilder { files }
    }

    /// Convert the journal. Returns the number of documents indexed;
    /// zero means the journal held nothing and no files were produced.
    pub fn convert<P>(
        &self,
        journal: &JournalReader,
        rankings: &DomainRankings,
        progress: &P,
        interrupt: &Interrupt,
    ) -> Result<u64>
    where
        P: ProgressSink<ForwardStep>,
    {
        if journal.is_empty() {
            warn!("journal is empty, skipping forward index construction");
            return Ok(0);
        }

        progress.progress(ForwardStep::GetDocIds);

        let mut doc_ids = RoaringTreemap::new();
        journal.for_each_document(&WordFilter::any(), |record| {
            interrupt.check()?;
            doc_ids.insert(record.doc_id);
            Ok(())
        })?;

        let n_docs = doc_ids.len();
        let mut ids = LongArray::create(&self.files.ids, n_docs as usize)?;
        let mut slot_of = AHashMap::with_capacity(n_docs as usize);
        for (slot, doc_id) in doc_ids.iter().enumerate() {
            ids.set(slot, doc_id);
            slot_of.insert(doc_id, slot);
        }

        progress.progress(ForwardStep::GatherOffsets);

        let mut data = LongArray::create(&self.files.data, n_docs as usize * ENTRY_SIZE)?;
        let mut spans = SpansWriter::create(&self.files.spans)?;

        journal.for_each_document(&WordFilter::any(), |record| {
            interrupt.check()?;

            // Present by construction of the id pass.
            let Some(&slot) = slot_of.get(&record.doc_id) else {
                return Ok(());
            };
            let base = slot * ENTRY_SIZE;

            let rank = rankings.rank(id::domain_id(record.doc_id));
            data.set(base + META_OFFSET, meta::encode_rank(record.doc_meta, rank));
            data.set(base + FEATURES_OFFSET, record.features as u64 | (record.size as u64) << 32);

            spans.begin_record(record.spans.len() as u8);
            for span in &record.spans {
                spans.write_span(span.tag, &span.positions);
            }
            data.set(base + SPANS_OFFSET, spans.end_record()?);
            Ok(())
        })?;

        progress.progress(ForwardStep::Force);
        ids.force()?;
        data.force()?;
        spans.finish()?;

        progress.progress(ForwardStep::Finished);
        Ok(n_docs)
    }
}
