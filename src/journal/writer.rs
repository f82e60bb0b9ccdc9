//! Append side of the posting journal.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::error::{Result, SileneError};
use crate::journal::model::DocRecord;
use crate::journal::{PAGE_HEADER_BYTES, PAGE_MAGIC, PAGE_VERSION, page_file_name, page_sequence};
use crate::util::varint;

/// Records per page before the writer rotates to a new file.
pub const DEFAULT_PAGE_RECORDS: usize = 100_000;

/// Writes document records into a journal directory, one page file at
/// a time. A page is built up in memory and written out whole, with
/// its checksum, once it reaches the record limit or the writer is
/// closed.
pub struct JournalWriter {
    dir: PathBuf,
    max_page_records: usize,
    next_page: u32,
    body: Vec<u8>,
    record_count: u32,
    pages_written: u32,
}

impl JournalWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<JournalWriter> {
        JournalWriter::with_page_records(dir, DEFAULT_PAGE_RECORDS)
    }

    /// Create the journal directory if needed and continue page
    /// numbering after any pages already present in it.
    pub fn with_page_records<P: AsRef<Path>>(dir: P, max_page_records: usize) -> Result<JournalWriter> {
        if max_page_records == 0 {
            return Err(SileneError::invalid_argument("page record limit must be positive"));
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut next_page = 0;
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name();
            if let Some(sequence) = name.to_str().and_then(page_sequence) {
                next_page = next_page.max(sequence + 1);
            }
        }

        Ok(JournalWriter {
            dir,
            max_page_records,
            next_page,
            body: Vec::new(),
            record_count: 0,
            pages_written: 0,
        })
    }

    /// Append one document record to the current page.
    pub fn put(&mut self, record: &DocRecord) -> Result<()> {
        if record.postings.len() > u32::MAX as usize {
            return Err(SileneError::invalid_argument("too many postings in record"));
        }
        if record.spans.len() > usize::from(u8::MAX) {
            return Err(SileneError::invalid_argument("too many span records"));
        }

        let body = &mut self.body;
        body.write_u64::<LittleEndian>(record.doc_id)?;
        body.write_u64::<LittleEndian>(record.doc_meta)?;
        body.write_u32::<LittleEndian>(record.features)?;
        body.write_u32::<LittleEndian>(record.size)?;

        body.write_u32::<LittleEndian>(record.postings.len() as u32)?;
        for posting in &record.postings {
            body.write_u64::<LittleEndian>(posting.term_id)?;
            body.write_u64::<LittleEndian>(posting.meta)?;
            let bytes = posting.positions.as_bytes();
            varint::encode_u64(body, bytes.len() as u64);
            body.extend_from_slice(bytes);
        }

        body.write_u8(record.spans.len() as u8)?;
        for span in &record.spans {
            body.write_u8(span.tag.code())?;
            let bytes = span.positions.as_bytes();
            varint::encode_u64(body, bytes.len() as u64);
            body.extend_from_slice(bytes);
        }

        self.record_count += 1;
        if self.record_count as usize >= self.max_page_records {
            self.flush_page()?;
        }
        Ok(())
    }

    /// Flush the trailing partial page, if any, and finish the journal.
    pub fn close(mut self) -> Result<()> {
        self.flush_page()
    }

    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    fn flush_page(&mut self) -> Result<()> {
        if self.record_count == 0 {
            return Ok(());
        }

        let path = self.dir.join(page_file_name(self.next_page));
        let crc = crc32fast::hash(&self.body);

        let mut header = Vec::with_capacity(PAGE_HEADER_BYTES);
        header.write_u32::<LittleEndian>(PAGE_MAGIC)?;
        header.write_u32::<LittleEndian>(PAGE_VERSION)?;
        header.write_u32::<LittleEndian>(self.record_count)?;
        header.write_u32::<LittleEndian>(crc)?;

        let mut file = File::create(&path)?;
        file.write_all(&header)?;
        file.write_all(&self.body)?;
        file.sync_all()?;

        debug!(
            "journal page {} written: {} records, {} bytes",
            path.display(),
            self.record_count,
            PAGE_HEADER_BYTES + self.body.len()
        );

        self.body.clear();
        self.record_count = 0;
        self.next_page += 1;
        self.pages_written += 1;
        Ok(())
    }
}
