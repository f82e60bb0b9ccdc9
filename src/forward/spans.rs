//! Span store: which structural region covers which word positions.
//!
//! The store is a flat stream of per-document records. A record is a
//! count byte followed by (tag code, length, encoded positions)
//! entries, one entry per region type present in the document. The
//! forward index data file keeps a packed (offset, length) pointer per
//! document, so the two files can evolve independently.
//!
//! A region's positions interleave start/end boundaries, end exclusive.
//! A region occurring several times (a page with many headings, say)
//! contributes several pairs to the one entry.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Result, SileneError};
use crate::model::tag::SpanTag;
use crate::sequence::VarintSequence;
use crate::util::varint;

/// Low bits of a span pointer word hold the record length; the rest is
/// the byte offset of the record in the store.
const LEN_BITS: u64 = 24;
const LEN_MASK: u64 = (1 << LEN_BITS) - 1;

pub(crate) fn encode_pointer(offset: u64, len: u64) -> u64 {
    (offset << LEN_BITS) | (len & LEN_MASK)
}

pub(crate) fn pointer_offset(word: u64) -> u64 {
    word >> LEN_BITS
}

pub(crate) fn pointer_len(word: u64) -> u64 {
    word & LEN_MASK
}

/// Streams span records to a store file during forward index
/// construction.
pub struct SpansWriter {
    out: BufWriter<File>,
    offset: u64,
    record: Vec<u8>,
}

impl SpansWriter {
    pub fn create(path: &Path) -> Result<SpansWriter> {
        Ok(SpansWriter {
            out: BufWriter::new(File::create(path)?),
            offset: 0,
            record: Vec::new(),
        })
    }

    /// Start a record of `count` region entries.
    pub fn begin_record(&mut self, count: u8) {
        self.record.clear();
        self.record.push(count);
    }

    /// Append one region entry to the open record.
    pub fn write_span(&mut self, tag: SpanTag, positions: &VarintSequence) {
        self.record.push(tag.code());
        let bytes = positions.as_bytes();
        varint::encode_u64(&mut self.record, bytes.len() as u64);
        self.record.extend_from_slice(bytes);
    }

    /// Write the open record out and return the packed pointer word
    /// the forward index stores for it.
    pub fn end_record(&mut self) -> Result<u64> {
        let len = self.record.len() as u64;
        if len > LEN_MASK {
            return Err(SileneError::index("span record exceeds the pointer length field"));
        }

        self.out.write_all(&self.record)?;
        let pointer = encode_pointer(self.offset, len);
        self.offset += len;
        Ok(pointer)
    }

    /// Flush and fsync the store.
    pub fn finish(self) -> Result<()> {
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

/// The word positions one region type covers in a document, held as
/// interlaced (start, end) boundary pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSpan {
    boundaries: Vec<u32>,
}

impl DocumentSpan {
    pub fn from_boundaries(boundaries: Vec<u32>) -> DocumentSpan {
        DocumentSpan { boundaries }
    }

    /// Number of (start, end) pairs. A trailing unpaired boundary is
    /// ignored.
    pub fn size(&self) -> usize {
        self.boundaries.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Total word count the region covers.
    pub fn length(&self) -> u32 {
        self.pairs().map(|(start, end)| end.saturating_sub(start)).sum()
    }

    pub fn contains_position(&self, position: u32) -> bool {
        self.pairs().any(|(start, end)| start <= position && position < end)
    }

    /// True if any of the positions, extended to a run of `len` words,
    /// fits entirely inside one of the region's pairs.
    pub fn contains_range(&self, positions: &[u32], len: u32) -> bool {
        self.pairs().any(|(start, end)| {
            positions.iter().any(|&p| start <= p && p.saturating_add(len) <= end)
        })
    }

    /// Number of (pair, position) combinations where such a run fits.
    pub fn count_range_matches(&self, positions: &[u32], len: u32) -> usize {
        self.pairs()
            .map(|(start, end)| {
                positions.iter().filter(|&&p| start <= p && p.saturating_add(len) <= end).count()
            })
            .sum()
    }

    fn pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.boundaries.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }

    pub(crate) fn set_boundaries(&mut self, values: &[u32]) {
        self.boundaries.clear();
        self.boundaries.extend_from_slice(values);
    }

    pub(crate) fn clear(&mut self) {
        self.boundaries.clear();
    }
}

/// A document's spans, grouped by region.
#[derive(Debug, Clone, Default)]
pub struct DocumentSpans {
    pub title: DocumentSpan,
    pub heading: DocumentSpan,
    pub code: DocumentSpan,
    pub nav: DocumentSpan,
    pub anchor: DocumentSpan,
    pub external_link_text: DocumentSpan,
    pub body: DocumentSpan,
}

impl DocumentSpans {
    pub fn get(&self, tag: SpanTag) -> &DocumentSpan {
        match tag {
            SpanTag::Title => &self.title,
            SpanTag::Heading => &self.heading,
            SpanTag::Code => &self.code,
            SpanTag::Nav => &self.nav,
            SpanTag::Anchor => &self.anchor,
            SpanTag::ExternalLinkText => &self.external_link_text,
            SpanTag::Body => &self.body,
        }
    }

    fn get_mut(&mut self, tag: SpanTag) -> &mut DocumentSpan {
        match tag {
            SpanTag::Title => &mut self.title,
            SpanTag::Heading => &mut self.heading,
            SpanTag::Code => &mut self.code,
            SpanTag::Nav => &mut self.nav,
            SpanTag::Anchor => &mut self.anchor,
            SpanTag::ExternalLinkText => &mut self.external_link_text,
            SpanTag::Body => &mut self.body,
        }
    }

    pub(crate) fn clear(&mut self) {
        for tag in SpanTag::ALL {
            self.get_mut(tag).clear();
        }
    }
}

/// Read-only view of a span store file.
pub struct SpansReader {
    map: Option<Mmap>,
}

impl SpansReader {
    pub fn open(path: &Path) -> Result<SpansReader> {
        let file = File::open(path)?;
        let map = if file.metadata()?.len() == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(SpansReader { map })
    }

    /// Decode the record a packed pointer addresses.
    pub fn read_spans(&self, pointer: u64) -> Result<DocumentSpans> {
        let mut spans = DocumentSpans::default();
        self.read_spans_into(pointer, &mut spans)?;
        Ok(spans)
    }

    /// Decode into caller-owned scratch, so many lookups during one
    /// query reuse the same allocations.
    pub fn read_spans_into(&self, pointer: u64, spans: &mut DocumentSpans) -> Result<()> {
        spans.clear();

        let len = pointer_len(pointer) as usize;
        if len == 0 {
            return Ok(());
        }
        let offset = pointer_offset(pointer) as usize;

        let Some(map) = &self.map else {
            return Err(SileneError::index("span pointer into an empty span store"));
        };
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= map.len())
            .ok_or_else(|| SileneError::index("span pointer out of bounds"))?;

        let record = &map[offset..end];
        let (&count, mut cur) = record
            .split_first()
            .ok_or_else(|| SileneError::index("empty span record"))?;

        for _ in 0..count {
            let (&code, rest) = cur
                .split_first()
                .ok_or_else(|| SileneError::index("truncated span record"))?;
            cur = rest;

            let (len, used) = varint::decode_u64(cur)?;
            cur = &cur[used..];
            let n = len as usize;
            if cur.len() < n {
                return Err(SileneError::index("truncated span record"));
            }
            let (bytes, rest) = cur.split_at(n);
            cur = rest;

            // Unknown region codes are skipped, matching the journal.
            let Some(tag) = SpanTag::from_code(code) else {
                continue;
            };
            let positions = VarintSequence::decode_bytes(bytes)?;
            spans.get_mut(tag).set_boundaries(positions.values());
        }
        Ok(())
    }
}
