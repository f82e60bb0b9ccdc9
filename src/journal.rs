//! Append-only posting journal.
//!
//! The journal is the hand-off point between the upstream document
//! processing pipeline and the index builders: one record per document,
//! holding the document's metadata word, feature bits and size, the
//! list of (term, metadata, positions) postings discovered in it, and
//! the structural span block. Both the forward and the reverse index
//! are derived views over this log, each built in its own pass.
//!
//! ## Page format
//!
//! A journal is a directory of page files named `page_NNNNNN.dat`,
//! rotated once a page reaches its record limit. Each page stands on
//! its own:
//!
//! ```text
//! [u32 magic "JRNL"] [u32 version] [u32 record count] [u32 body crc32]
//! body: record*
//! ```
//!
//! A record is laid out as
//!
//! ```text
//! [u64 doc id] [u64 doc meta] [u32 features] [u32 size]
//! [u32 posting count]
//!   posting*: [u64 term id] [u64 word meta] [varint len] [len bytes]
//! [u8 span count]
//!   span*: [u8 tag code] [varint len] [len bytes]
//! ```
//!
//! where the length-prefixed byte runs are encoded position sequences.
//! All fixed-width fields are little-endian. The body checksum lets a
//! reader drop a truncated or damaged page instead of failing the
//! whole journal.

pub mod model;
pub mod reader;
pub mod writer;

pub use model::{DocRecord, JournalStatistics, Posting, SpanRecord, WordFilter};
pub use reader::JournalReader;
pub use writer::JournalWriter;

/// Page header fields, little-endian. The magic reads "JRNL" on disk.
pub(crate) const PAGE_MAGIC: u32 = 0x4C4E_524A;
pub(crate) const PAGE_VERSION: u32 = 1;
pub(crate) const PAGE_HEADER_BYTES: usize = 16;

pub(crate) fn page_file_name(sequence: u32) -> String {
    format!("page_{sequence:06}.dat")
}

/// Parse the sequence number out of a page file name, or `None` if the
/// name does not belong to a journal page.
pub(crate) fn page_sequence(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("page_")?.strip_suffix(".dat")?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_file_names() {
        assert_eq!(page_file_name(0), "page_000000.dat");
        assert_eq!(page_file_name(123), "page_000123.dat");

        assert_eq!(page_sequence("page_000123.dat"), Some(123));
        assert_eq!(page_sequence("page_000000.dat"), Some(0));
        assert_eq!(page_sequence("manifest.json"), None);
        assert_eq!(page_sequence("page_12.dat"), None);
        assert_eq!(page_sequence("page_00000x.dat"), None);
    }
}
