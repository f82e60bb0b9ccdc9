//! Forward index lookups.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::thread;

use ahash::AHashMap;
use log::{debug, warn};

use crate::error::Result;
use crate::forward::spans::{DocumentSpans, SpansReader};
use crate::forward::{ENTRY_SIZE, FEATURES_OFFSET, META_OFFSET, SPANS_OFFSET};
use crate::model::id;
use crate::storage::array::LongArrayReader;
use crate::storage::files::ForwardFileSet;

/// Read side of the forward index.
///
/// Lookups accept rank-encoded document ids and strip the rank before
/// resolving, so ids taken straight out of reverse index postings work
/// unchanged. A reader over an incomplete file set reports itself not
/// loaded and answers every query with zero or empty values; a
/// document id the index does not cover behaves the same way, since
/// absence is an ordinary query-time condition.
pub struct ForwardIndexReader {
    ids: Option<Arc<LongArrayReader>>,
    data: Option<LongArrayReader>,
    spans: Option<SpansReader>,
    slot_map: Arc<OnceLock<AHashMap<u64, u32>>>,
}

impl ForwardIndexReader {
    /// Open a generation's file set.
    ///
    /// Starts building the id lookup map on a background thread; until
    /// that map is published, lookups fall back to binary search over
    /// the sorted ids array.
    pub fn open(files: &ForwardFileSet) -> Result<ForwardIndexReader> {
        if !files.all_exist() {
            let dir = files.ids.parent().unwrap_or(Path::new("")).display().to_string();
            warn!("forward index files missing under {dir}, reader starts unloaded");
            return Ok(ForwardIndexReader {
                ids: None,
                data: None,
                spans: None,
                slot_map: Arc::new(OnceLock::new()),
            });
        }

        let reader = ForwardIndexReader::open_eager(files)?;
        reader.spawn_map_builder();
        Ok(reader)
    }

    fn open_eager(files: &ForwardFileSet) -> Result<ForwardIndexReader> {
        Ok(ForwardIndexReader {
            ids: Some(Arc::new(LongArrayReader::open(&files.ids)?)),
            data: Some(LongArrayReader::open(&files.data)?),
            spans: Some(SpansReader::open(&files.spans)?),
            slot_map: Arc::new(OnceLock::new()),
        })
    }

    fn spawn_map_builder(&self) {
        let Some(ids) = self.ids.clone() else {
            return;
        };
        let slot_map = Arc::clone(&self.slot_map);

        thread::spawn(move || {
            let mut map = AHashMap::with_capacity(ids.len());
            for slot in 0..ids.len() {
                map.insert(ids.get(slot), slot as u32);
            }
            let _ = slot_map.set(map);
        });
    }

    /// False when any of the generation's files was missing at open.
    pub fn is_loaded(&self) -> bool {
        self.ids.is_some() && self.data.is_some() && self.spans.is_some()
    }

    /// True once the background id lookup map has been published.
    pub fn lookup_map_ready(&self) -> bool {
        self.slot_map.get().is_some()
    }

    pub fn num_docs(&self) -> usize {
        self.ids.as_ref().map_or(0, |ids| ids.len())
    }

    /// The document's metadata word with its domain rank spliced in,
    /// 0 when unknown.
    pub fn get_doc_meta(&self, doc_id: u64) -> u64 {
        self.entry_word(doc_id, META_OFFSET).unwrap_or(0)
    }

    /// The document's feature bitmask, 0 when unknown.
    pub fn get_html_features(&self, doc_id: u64) -> u32 {
        self.entry_word(doc_id, FEATURES_OFFSET).unwrap_or(0) as u32
    }

    /// The document's size in words, 0 when unknown.
    pub fn get_doc_size(&self, doc_id: u64) -> u32 {
        (self.entry_word(doc_id, FEATURES_OFFSET).unwrap_or(0) >> 32) as u32
    }

    /// All structural spans of a document, empty when unknown.
    pub fn get_document_spans(&self, doc_id: u64) -> DocumentSpans {
        let mut spans = DocumentSpans::default();
        self.get_document_spans_into(doc_id, &mut spans);
        spans
    }

    /// Scratch-reusing variant of [`get_document_spans`](Self::get_document_spans).
    pub fn get_document_spans_into(&self, doc_id: u64, spans: &mut DocumentSpans) {
        spans.clear();

        let Some(reader) = &self.spans else {
            return;
        };
        let Some(pointer) = self.entry_word(doc_id, SPANS_OFFSET) else {
            return;
        };
        if let Err(e) = reader.read_spans_into(pointer, spans) {
            warn!("dropping unreadable span record for document {doc_id}: {e}");
            spans.clear();
        }
    }

    fn entry_word(&self, doc_id: u64, field: usize) -> Option<u64> {
        let data = self.data.as_ref()?;
        let slot = self.slot_for(id::without_rank(doc_id))?;
        Some(data.get(slot * ENTRY_SIZE + field))
    }

    fn slot_for(&self, doc_id: u64) -> Option<usize> {
        let ids = self.ids.as_ref()?;

        let slot = if let Some(map) = self.slot_map.get() {
            map.get(&doc_id).map(|&slot| slot as usize)
        } else {
            ids.binary_search_strided(doc_id, 0, ids.len(), 1).ok()
        };

        if slot.is_none() {
            debug!("document {doc_id} absent from the forward index");
        }
        slot
    }

    #[cfg(test)]
    fn build_map_now(&self) {
        if let Some(ids) = &self.ids {
            let mut map = AHashMap::with_capacity(ids.len());
            for slot in 0..ids.len() {
                map.insert(ids.get(slot), slot as u32);
            }
            let _ = self.slot_map.set(map);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::forward::builder::ForwardIndexBuilder;
    use crate::journal::{DocRecord, JournalReader, JournalWriter, Posting, SpanRecord};
    use crate::model::tag::SpanTag;
    use crate::model::{id, meta};
    use crate::progress::{Interrupt, NullProgress};
    use crate::ranking::DomainRankings;
    use crate::sequence::VarintSequence;

    fn files(dir: &Path) -> ForwardFileSet {
        ForwardFileSet {
            ids: dir.join("fwd-ids.dat"),
            data: dir.join("fwd-data.dat"),
            spans: dir.join("fwd-spans.dat"),
        }
    }

    /// Two documents in domains 1 and 2, the first with heading spans.
    fn build_index(dir: &Path) -> ForwardFileSet {
        let journal_dir = dir.join("journal");
        let mut writer = JournalWriter::new(&journal_dir).unwrap();
        writer
            .put(&DocRecord {
                doc_id: id::encode_doc_id(1, 36),
                doc_meta: meta::encode_doc_meta(4, 1, 90, 2, 7, 0),
                features: 0b101,
                size: 1200,
                postings: vec![Posting {
                    term_id: 50,
                    meta: 1,
                    positions: VarintSequence::encode(&[1, 2, 3]).unwrap(),
                }],
                spans: vec![SpanRecord {
                    tag: SpanTag::Heading,
                    positions: VarintSequence::encode(&[10, 15]).unwrap(),
                }],
            })
            .unwrap();
        writer
            .put(&DocRecord {
                doc_id: id::encode_doc_id(2, 1),
                doc_meta: meta::encode_doc_meta(1, 1, 80, 1, 3, 0),
                features: 0,
                size: 300,
                postings: Vec::new(),
                spans: Vec::new(),
            })
            .unwrap();
        writer.close().unwrap();

        let journal = JournalReader::open(&journal_dir).unwrap();
        let rankings = DomainRankings::from_pairs([(1, 5)]);
        let out = files(dir);
        ForwardIndexBuilder::new(out.clone())
            .convert(&journal, &rankings, &NullProgress, &Interrupt::new())
            .unwrap();
        out
    }

    #[test]
    fn test_lookups_with_binary_search() {
        let dir = TempDir::new().unwrap();
        let out = build_index(dir.path());

        let reader = ForwardIndexReader::open_eager(&out).unwrap();
        assert!(reader.is_loaded());
        assert!(!reader.lookup_map_ready());
        assert_eq!(reader.num_docs(), 2);

        let doc = id::encode_doc_id(1, 36);
        let doc_meta = reader.get_doc_meta(doc);
        assert_eq!(meta::decode_rank(doc_meta), 5);
        assert_eq!(meta::doc_year(doc_meta), 90);
        assert_eq!(reader.get_html_features(doc), 0b101);
        assert_eq!(reader.get_doc_size(doc), 1200);

        let spans = reader.get_document_spans(doc);
        assert!(spans.heading.contains_position(12));
        assert!(spans.title.is_empty());

        // Domain 2 is not in the rankings snapshot, so its rank clamps
        // to the worst encodable value.
        let other = id::encode_doc_id(2, 1);
        assert_eq!(meta::decode_rank(reader.get_doc_meta(other)), 255);
    }

    #[test]
    fn test_lookups_with_map() {
        let dir = TempDir::new().unwrap();
        let out = build_index(dir.path());

        let reader = ForwardIndexReader::open_eager(&out).unwrap();
        reader.build_map_now();
        assert!(reader.lookup_map_ready());

        let doc = id::encode_doc_id(1, 36);
        assert_eq!(meta::doc_year(reader.get_doc_meta(doc)), 90);
        assert_eq!(reader.get_doc_size(doc), 1200);
        assert_eq!(reader.get_doc_meta(id::encode_doc_id(30, 1)), 0);
    }

    #[test]
    fn test_background_map_agrees_with_search() {
        let dir = TempDir::new().unwrap();
        let out = build_index(dir.path());

        let reader = ForwardIndexReader::open(&out).unwrap();
        let doc = id::encode_doc_id(1, 36);
        let before = reader.get_doc_meta(doc);

        for _ in 0..5_000 {
            if reader.lookup_map_ready() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(reader.lookup_map_ready());
        assert_eq!(reader.get_doc_meta(doc), before);
    }

    #[test]
    fn test_rank_encoded_id_resolves() {
        let dir = TempDir::new().unwrap();
        let out = build_index(dir.path());
        let reader = ForwardIndexReader::open_eager(&out).unwrap();

        let doc = id::encode_doc_id(1, 36);
        let ranked = id::with_rank(5, doc);
        assert_eq!(reader.get_doc_meta(ranked), reader.get_doc_meta(doc));
        assert_ne!(reader.get_doc_meta(ranked), 0);
    }

    #[test]
    fn test_missing_files_degrade_to_unloaded() {
        let dir = TempDir::new().unwrap();
        let reader = ForwardIndexReader::open(&files(dir.path())).unwrap();

        assert!(!reader.is_loaded());
        assert_eq!(reader.num_docs(), 0);
        assert_eq!(reader.get_doc_meta(1), 0);
        assert_eq!(reader.get_html_features(1), 0);
        assert_eq!(reader.get_doc_size(1), 0);
        assert!(reader.get_document_spans(1).heading.is_empty());
    }

    #[test]
    fn test_partial_file_set_is_unloaded() {
        let dir = TempDir::new().unwrap();
        let out = build_index(dir.path());
        std::fs::remove_file(&out.data).unwrap();

        let reader = ForwardIndexReader::open(&out).unwrap();
        assert!(!reader.is_loaded());
        assert_eq!(reader.get_doc_meta(id::encode_doc_id(1, 36)), 0);
    }
}
