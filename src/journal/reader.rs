//! Read side of the posting journal.
//!
//! A reader concatenates all pages of a journal directory into one
//! logical sequence, in page order. Every iteration call starts a
//! fresh forward-only pass; separate passes over the same journal are
//! independent and may run concurrently.

use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashSet;
use byteorder::{LittleEndian, ReadBytesExt};
use log::{info, warn};

use crate::error::{Result, SileneError};
use crate::journal::model::{DocRecord, JournalStatistics, Posting, SpanRecord, WordFilter};
use crate::journal::{PAGE_HEADER_BYTES, PAGE_MAGIC, PAGE_VERSION, page_sequence};
use crate::model::tag::SpanTag;
use crate::sequence::VarintSequence;
use crate::util::varint;

pub struct JournalReader {
    pages: Vec<PathBuf>,
}

impl JournalReader {
    /// Open a journal directory. A missing directory is reported as an
    /// empty journal rather than an error, so callers can distinguish
    /// "nothing to do" from an actual failure.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<JournalReader> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            info!("journal directory {} not found, treating as empty", dir.display());
            return Ok(JournalReader { pages: Vec::new() });
        }

        let mut pages = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().and_then(page_sequence).is_some() {
                pages.push(entry.path());
            }
        }
        // Zero-padded names sort in sequence order.
        pages.sort();

        Ok(JournalReader { pages })
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Iterate every document record in writer order. Postings the
    /// filter rejects are skipped without being materialized; the
    /// record itself is still delivered.
    ///
    /// The record reference is only valid for the duration of the
    /// callback; its buffers are reused between documents. An error
    /// returned from the callback stops the pass and is handed back,
    /// which is also how conversion jobs bail out when interrupted.
    pub fn for_each_document<F>(&self, filter: &WordFilter, mut f: F) -> Result<()>
    where
        F: FnMut(&DocRecord) -> Result<()>,
    {
        self.scan(filter, true, &mut f)
    }

    /// Iterate accepted postings across all documents, skipping the
    /// span blocks entirely.
    pub fn for_each_posting<F>(&self, filter: &WordFilter, mut f: F) -> Result<()>
    where
        F: FnMut(u64, &Posting) -> Result<()>,
    {
        self.scan(filter, false, &mut |record: &DocRecord| {
            for posting in &record.postings {
                f(record.doc_id, posting)?;
            }
            Ok(())
        })
    }

    /// Gather document and posting counts plus the sorted set of
    /// distinct term ids, in a single unfiltered pass.
    pub fn statistics(&self) -> Result<JournalStatistics> {
        let mut document_count = 0u64;
        let mut posting_count = 0u64;
        let mut terms = AHashSet::new();

        self.scan(&WordFilter::any(), false, &mut |record: &DocRecord| {
            document_count += 1;
            posting_count += record.postings.len() as u64;
            for posting in &record.postings {
                terms.insert(posting.term_id);
            }
            Ok(())
        })?;

        let mut term_ids: Vec<u64> = terms.into_iter().collect();
        term_ids.sort_unstable();

        Ok(JournalStatistics {
            document_count,
            posting_count,
            term_ids,
        })
    }

    fn scan<F>(&self, filter: &WordFilter, want_spans: bool, f: &mut F) -> Result<()>
    where
        F: FnMut(&DocRecord) -> Result<()>,
    {
        let mut record = DocRecord::default();

        for page in &self.pages {
            let Some((count, data)) = read_page(page)? else {
                continue;
            };

            let mut cur = &data[PAGE_HEADER_BYTES..];
            for n in 0..count {
                match parse_record(cur, filter, want_spans, &mut record) {
                    Ok(rest) => {
                        cur = rest;
                        f(&record)?;
                    }
                    Err(e) => {
                        warn!(
                            "journal page {} is damaged at record {} of {}: {}; dropping the rest of the page",
                            page.display(),
                            n,
                            count,
                            e
                        );
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Load one page and verify its header and checksum. A page that fails
/// verification is dropped with a warning, per the journal's partial
/// data policy.
fn read_page(path: &Path) -> Result<Option<(u32, Vec<u8>)>> {
    let data = fs::read(path)?;
    if data.len() < PAGE_HEADER_BYTES {
        warn!("journal page {} is shorter than its header, skipping", path.display());
        return Ok(None);
    }

    let mut header = &data[..PAGE_HEADER_BYTES];
    let magic = header.read_u32::<LittleEndian>()?;
    let version = header.read_u32::<LittleEndian>()?;
    let count = header.read_u32::<LittleEndian>()?;
    let crc = header.read_u32::<LittleEndian>()?;

    if magic != PAGE_MAGIC || version != PAGE_VERSION {
        warn!("journal page {} has an unrecognized header, skipping", path.display());
        return Ok(None);
    }
    if crc32fast::hash(&data[PAGE_HEADER_BYTES..]) != crc {
        warn!(
            "journal page {} fails its checksum, skipping {} records",
            path.display(),
            count
        );
        return Ok(None);
    }

    Ok(Some((count, data)))
}

fn parse_record<'a>(
    mut cur: &'a [u8],
    filter: &WordFilter,
    want_spans: bool,
    record: &mut DocRecord,
) -> Result<&'a [u8]> {
    record.clear();
    record.doc_id = cur.read_u64::<LittleEndian>()?;
    record.doc_meta = cur.read_u64::<LittleEndian>()?;
    record.features = cur.read_u32::<LittleEndian>()?;
    record.size = cur.read_u32::<LittleEndian>()?;

    let posting_count = cur.read_u32::<LittleEndian>()?;
    for _ in 0..posting_count {
        let term_id = cur.read_u64::<LittleEndian>()?;
        let meta = cur.read_u64::<LittleEndian>()?;
        let bytes = take_run(&mut cur)?;
        if filter.accept(meta) {
            record.postings.push(Posting {
                term_id,
                meta,
                positions: VarintSequence::from_bytes(bytes.to_vec()),
            });
        }
    }

    let span_count = cur.read_u8()?;
    for _ in 0..span_count {
        let code = cur.read_u8()?;
        let bytes = take_run(&mut cur)?;
        if !want_spans {
            continue;
        }
        // Unknown tag codes are skipped, not treated as corruption.
        if let Some(tag) = SpanTag::from_code(code) {
            record.spans.push(SpanRecord {
                tag,
                positions: VarintSequence::from_bytes(bytes.to_vec()),
            });
        }
    }

    Ok(cur)
}

/// Split a varint-length-prefixed byte run off the front of the cursor.
fn take_run<'a>(cur: &mut &'a [u8]) -> Result<&'a [u8]> {
    let remaining: &'a [u8] = *cur;
    let (len, used) = varint::decode_u64(remaining)?;
    let remaining = &remaining[used..];

    let len = usize::try_from(len).map_err(|_| SileneError::journal("length prefix out of range"))?;
    if remaining.len() < len {
        return Err(SileneError::journal("truncated byte run in record"));
    }
    let (run, rest) = remaining.split_at(len);
    *cur = rest;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::journal::writer::JournalWriter;
    use crate::journal::{PAGE_MAGIC, PAGE_VERSION, page_file_name};
    use crate::model::meta::word_flags;

    fn make_record(doc_id: u64, postings: Vec<Posting>, spans: Vec<SpanRecord>) -> DocRecord {
        DocRecord {
            doc_id,
            doc_meta: doc_id * 10,
            features: 3,
            size: 250,
            postings,
            spans,
        }
    }

    fn posting(term_id: u64, meta: u64, positions: &[u32]) -> Posting {
        Posting {
            term_id,
            meta,
            positions: VarintSequence::encode(positions).unwrap(),
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(dir.path()).unwrap();

        let spans = vec![SpanRecord {
            tag: SpanTag::Heading,
            positions: VarintSequence::encode(&[10, 15]).unwrap(),
        }];
        writer
            .put(&make_record(7, vec![posting(100, 1, &[1, 5]), posting(200, 2, &[2])], spans))
            .unwrap();
        writer.put(&make_record(8, vec![posting(100, 4, &[3])], Vec::new())).unwrap();
        writer.close().unwrap();

        let reader = JournalReader::open(dir.path()).unwrap();
        assert!(!reader.is_empty());
        assert_eq!(reader.page_count(), 1);

        let mut seen = Vec::new();
        reader
            .for_each_document(&WordFilter::any(), |record| {
                seen.push((
                    record.doc_id,
                    record.doc_meta,
                    record.features,
                    record.size,
                    record.postings.clone(),
                    record.spans.clone(),
                ));
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.len(), 2);

        let (doc_id, doc_meta, features, size, postings, spans) = &seen[0];
        assert_eq!(*doc_id, 7);
        assert_eq!(*doc_meta, 70);
        assert_eq!(*features, 3);
        assert_eq!(*size, 250);
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].term_id, 100);
        assert_eq!(postings[0].positions.decode().unwrap().values(), &[1, 5]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].tag, SpanTag::Heading);
        assert_eq!(spans[0].positions.decode().unwrap().values(), &[10, 15]);

        assert_eq!(seen[1].0, 8);
        assert!(seen[1].5.is_empty());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let reader = JournalReader::open(dir.path().join("no-such-journal")).unwrap();

        assert!(reader.is_empty());
        assert_eq!(reader.page_count(), 0);

        let mut called = false;
        reader
            .for_each_document(&WordFilter::any(), |_| {
                called = true;
                Ok(())
            })
            .unwrap();
        assert!(!called);

        let stats = reader.statistics().unwrap();
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.highest_term_id(), None);
    }

    #[test]
    fn test_filter_skips_postings() {
        let dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(dir.path()).unwrap();
        writer
            .put(&make_record(
                1,
                vec![
                    posting(10, word_flags::TITLE, &[1]),
                    posting(20, word_flags::SITE, &[2]),
                    posting(30, word_flags::TITLE | word_flags::NAMES, &[3]),
                ],
                Vec::new(),
            ))
            .unwrap();
        writer.close().unwrap();

        let reader = JournalReader::open(dir.path()).unwrap();
        let mut terms = Vec::new();
        reader
            .for_each_posting(&WordFilter::with_flags(word_flags::TITLE), |doc_id, posting| {
                assert_eq!(doc_id, 1);
                terms.push(posting.term_id);
                Ok(())
            })
            .unwrap();

        assert_eq!(terms, vec![10, 30]);
    }

    #[test]
    fn test_order_spans_pages() {
        let dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::with_page_records(dir.path(), 2).unwrap();
        for doc_id in [5, 3, 9, 1, 7] {
            writer.put(&make_record(doc_id, vec![posting(doc_id, 1, &[1])], Vec::new())).unwrap();
        }
        writer.close().unwrap();

        let reader = JournalReader::open(dir.path()).unwrap();
        assert_eq!(reader.page_count(), 3);

        let mut order = Vec::new();
        reader
            .for_each_document(&WordFilter::any(), |r| {
                order.push(r.doc_id);
                Ok(())
            })
            .unwrap();
        assert_eq!(order, vec![5, 3, 9, 1, 7]);
    }

    #[test]
    fn test_corrupt_page_is_dropped() {
        let dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::with_page_records(dir.path(), 1).unwrap();
        writer.put(&make_record(1, vec![posting(10, 1, &[1])], Vec::new())).unwrap();
        writer.put(&make_record(2, vec![posting(20, 1, &[1])], Vec::new())).unwrap();
        writer.close().unwrap();

        // Truncate the second page mid-body.
        let second = dir.path().join(page_file_name(1));
        let file = fs::OpenOptions::new().write(true).open(&second).unwrap();
        file.set_len(PAGE_HEADER_BYTES as u64 + 3).unwrap();

        let reader = JournalReader::open(dir.path()).unwrap();
        let mut docs = Vec::new();
        reader
            .for_each_document(&WordFilter::any(), |r| {
                docs.push(r.doc_id);
                Ok(())
            })
            .unwrap();
        assert_eq!(docs, vec![1]);
    }

    #[test]
    fn test_garbage_and_foreign_files_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(page_file_name(0)), b"junk").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a page").unwrap();

        let reader = JournalReader::open(dir.path()).unwrap();
        assert_eq!(reader.page_count(), 1);

        let stats = reader.statistics().unwrap();
        assert_eq!(stats.document_count, 0);
    }

    #[test]
    fn test_unknown_span_tag_is_skipped() {
        let dir = TempDir::new().unwrap();

        // One record with a single span carrying an unassigned tag code.
        let mut body = Vec::new();
        body.extend_from_slice(&9u64.to_le_bytes());
        body.extend_from_slice(&1u64.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(1);
        body.push(b'z');
        let positions = VarintSequence::encode(&[1, 3]).unwrap();
        varint::encode_u64(&mut body, positions.as_bytes().len() as u64);
        body.extend_from_slice(positions.as_bytes());

        let mut page = Vec::new();
        page.extend_from_slice(&PAGE_MAGIC.to_le_bytes());
        page.extend_from_slice(&PAGE_VERSION.to_le_bytes());
        page.extend_from_slice(&1u32.to_le_bytes());
        page.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        page.extend_from_slice(&body);
        fs::write(dir.path().join(page_file_name(0)), page).unwrap();

        let reader = JournalReader::open(dir.path()).unwrap();
        let mut seen = Vec::new();
        reader
            .for_each_document(&WordFilter::any(), |r| {
                seen.push((r.doc_id, r.spans.len()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![(9, 0)]);
    }

    #[test]
    fn test_callback_error_stops_pass() {
        let dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::new(dir.path()).unwrap();
        for doc_id in 1..=3 {
            writer.put(&make_record(doc_id, vec![posting(1, 1, &[1])], Vec::new())).unwrap();
        }
        writer.close().unwrap();

        let reader = JournalReader::open(dir.path()).unwrap();
        let mut seen = 0;
        let result = reader.for_each_document(&WordFilter::any(), |_| {
            seen += 1;
            if seen == 2 {
                return Err(SileneError::Interrupted);
            }
            Ok(())
        });

        assert!(matches!(result, Err(SileneError::Interrupted)));
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_statistics() {
        let dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::with_page_records(dir.path(), 2).unwrap();
        writer
            .put(&make_record(1, vec![posting(300, 1, &[1]), posting(100, 1, &[2])], Vec::new()))
            .unwrap();
        writer.put(&make_record(2, vec![posting(200, 1, &[1])], Vec::new())).unwrap();
        writer.put(&make_record(3, vec![posting(100, 1, &[4])], Vec::new())).unwrap();
        writer.close().unwrap();

        let stats = JournalReader::open(dir.path()).unwrap().statistics().unwrap();
        assert_eq!(stats.document_count, 3);
        assert_eq!(stats.posting_count, 4);
        assert_eq!(stats.term_ids, vec![100, 200, 300]);
        assert_eq!(stats.highest_term_id(), Some(300));
    }
}
